use crate::config::{AnalysisConfig, ConfigError};
use crate::core::blocking::{CandidateSearch, SearchStats};
use crate::core::classifier::ClassifiedPair;
use crate::core::evaluator::{self, DetectionReport, PairSummary, VariantOutcome};
use crate::core::features::FeatureExtractor;
use crate::core::generator::{DuplicateGenerator, GenerateError, GeneratedDataset};
use crate::core::impact::{self, ImpactRecord, RiskDistribution};
use crate::core::record::{Record, RecordError, RecordTable};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),
}

/// Classified and scored candidates for one record table.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub pairs: Vec<ClassifiedPair>,
    pub impacts: Vec<ImpactRecord>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub dataset: GeneratedDataset,
    pub detection: DetectionResult,
    pub evaluation: DetectionReport,
    pub outcomes: Vec<VariantOutcome>,
    pub summary: PairSummary,
    pub risk: RiskDistribution,
}

pub struct AnalysisPipeline {
    config: AnalysisConfig,
    search: CandidateSearch,
    extractor: FeatureExtractor,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let search = CandidateSearch::from_config(&config.detection)?;
        let extractor = FeatureExtractor::from_config(&config.detection);
        Ok(Self {
            config,
            search,
            extractor,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Detect, classify and score duplicates in `table` as it stands.
    pub fn detect(&self, table: &RecordTable) -> DetectionResult {
        let outcome = self.search.search(table.keys());

        let pairs: Vec<ClassifiedPair> = outcome
            .pairs
            .iter()
            .filter_map(|scored| self.extractor.extract(scored, table))
            .map(ClassifiedPair::from_pair)
            .collect();
        let impacts = impact::assess_all(&pairs, table);

        log::info!(
            "Classified {} candidate pairs ({} comparisons, budget {})",
            pairs.len(),
            outcome.stats.comparisons_attempted,
            outcome.stats.budget
        );

        DetectionResult {
            pairs,
            impacts,
            stats: outcome.stats,
        }
    }

    pub fn generate(&self, table: &RecordTable) -> Result<GeneratedDataset, PipelineError> {
        let generator = DuplicateGenerator::new(self.config.generator.clone());
        Ok(generator.generate(table)?)
    }

    /// Generate labeled duplicates, mix them into the originals, detect over
    /// the combined table and measure recall against the generated labels.
    pub fn run(&self, records: Vec<Record>) -> Result<AnalysisReport, PipelineError> {
        let originals = RecordTable::new(records)?;
        let dataset = self.generate(&originals)?;
        log::info!(
            "Generated {} duplicate variants from {} original keys",
            dataset.len(),
            originals.key_count()
        );

        let combined: Vec<Record> = originals
            .records()
            .chain(dataset.records())
            .cloned()
            .collect();
        let combined = RecordTable::new(combined)?;

        let detection = self.detect(&combined);
        let detected = || detection.pairs.iter().map(|p| &p.pair);
        let evaluation = evaluator::evaluate(&dataset, detected());
        let outcomes = evaluator::outcomes(&dataset, detected());
        let summary = PairSummary::from_pairs(detected());
        let risk = RiskDistribution::from_records(&detection.impacts);

        Ok(AnalysisReport {
            dataset,
            detection,
            evaluation,
            outcomes,
            summary,
            risk,
        })
    }
}
