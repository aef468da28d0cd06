//! Recall of the detector against generator ground truth.
//!
//! A generated row counts as detected when its record key appears on either
//! side of any detected pair.

use crate::core::features::CandidatePair;
use crate::core::generator::{DifficultyClass, GeneratedDataset, VariationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecall {
    pub total: usize,
    pub detected: usize,
}

impl ClassRecall {
    pub fn missed(&self) -> usize {
        self.total - self.detected
    }

    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.detected as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub fuzzy: ClassRecall,
    pub non_fuzzy: ClassRecall,
}

impl DetectionReport {
    pub fn class(&self, class: DifficultyClass) -> ClassRecall {
        match class {
            DifficultyClass::FuzzyDetectable => self.fuzzy,
            DifficultyClass::NonFuzzyDetectable => self.non_fuzzy,
        }
    }

    pub fn overall(&self) -> ClassRecall {
        ClassRecall {
            total: self.fuzzy.total + self.non_fuzzy.total,
            detected: self.fuzzy.detected + self.non_fuzzy.detected,
        }
    }
}

/// Detection status of one generated variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOutcome {
    pub record_key: String,
    pub source_key: String,
    pub difficulty_class: DifficultyClass,
    pub variation_kind: VariationKind,
    pub detected: bool,
}

fn detected_keys<'a, I>(pairs: I) -> HashSet<&'a str>
where
    I: IntoIterator<Item = &'a CandidatePair>,
{
    pairs
        .into_iter()
        .flat_map(|p| [p.key_a.as_str(), p.key_b.as_str()])
        .collect()
}

pub fn evaluate<'a, I>(dataset: &GeneratedDataset, pairs: I) -> DetectionReport
where
    I: IntoIterator<Item = &'a CandidatePair>,
{
    let detected = detected_keys(pairs);
    let mut report = DetectionReport::default();

    for dup in &dataset.duplicates {
        let rows = dup.records.len();
        let hit = detected.contains(dup.record_key.as_str());
        let recall = match dup.difficulty_class {
            DifficultyClass::FuzzyDetectable => &mut report.fuzzy,
            DifficultyClass::NonFuzzyDetectable => &mut report.non_fuzzy,
        };
        recall.total += rows;
        if hit {
            recall.detected += rows;
        }
    }

    log::info!(
        "Detected {}/{} fuzzy-detectable and {}/{} non-fuzzy-detectable rows",
        report.fuzzy.detected,
        report.fuzzy.total,
        report.non_fuzzy.detected,
        report.non_fuzzy.total
    );
    report
}

pub fn outcomes<'a, I>(dataset: &GeneratedDataset, pairs: I) -> Vec<VariantOutcome>
where
    I: IntoIterator<Item = &'a CandidatePair>,
{
    let detected = detected_keys(pairs);
    dataset
        .duplicates
        .iter()
        .map(|dup| VariantOutcome {
            record_key: dup.record_key.clone(),
            source_key: dup.source_key.clone(),
            difficulty_class: dup.difficulty_class,
            variation_kind: dup.variation_kind,
            detected: detected.contains(dup.record_key.as_str()),
        })
        .collect()
}

/// Temporal and similarity profile of the detected pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub pair_count: usize,
    pub mean_similarity: Option<f64>,
    pub mean_hours: Option<f64>,
    pub median_hours: Option<f64>,
    pub min_hours: Option<f64>,
    pub max_hours: Option<f64>,
}

impl PairSummary {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = &'a CandidatePair>,
    {
        let (similarities, mut hours): (Vec<f64>, Vec<f64>) = pairs
            .into_iter()
            .map(|p| (p.features.string_similarity, p.features.time_difference_hours))
            .unzip();

        if hours.is_empty() {
            return Self::default();
        }

        hours.sort_by(f64::total_cmp);
        let n = hours.len();
        let median = if n % 2 == 1 {
            hours[n / 2]
        } else {
            (hours[n / 2 - 1] + hours[n / 2]) / 2.0
        };

        Self {
            pair_count: n,
            mean_similarity: Some(similarities.iter().sum::<f64>() / n as f64),
            mean_hours: Some(hours.iter().sum::<f64>() / n as f64),
            median_hours: Some(median),
            min_hours: hours.first().copied(),
            max_hours: hours.last().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FeatureVector;
    use crate::core::generator::GeneratedDuplicate;
    use crate::core::record::Record;
    use chrono::{TimeZone, Utc};

    fn pair(a: &str, b: &str, sim: f64, hours: f64) -> CandidatePair {
        CandidatePair {
            key_a: a.to_string(),
            key_b: b.to_string(),
            features: FeatureVector {
                string_similarity: sim,
                time_difference_hours: hours,
                same_actor: false,
                activity_similarity: 0.0,
            },
            trace_a: Vec::new(),
            trace_b: Vec::new(),
        }
    }

    fn duplicate(key: &str, source: &str, kind: VariationKind, rows: usize) -> GeneratedDuplicate {
        let t = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        GeneratedDuplicate {
            record_key: key.to_string(),
            source_key: source.to_string(),
            difficulty_class: kind.difficulty_class(),
            variation_kind: kind,
            records: (0..rows).map(|_| Record::new(key, Some("u"), "A", t)).collect(),
        }
    }

    fn dataset() -> GeneratedDataset {
        GeneratedDataset {
            duplicates: vec![
                duplicate("12346", "12345", VariationKind::Typo, 1),
                duplicate("1245", "12345", VariationKind::InsertDelete, 1),
                duplicate("21345", "12345", VariationKind::Transposition, 2),
                duplicate("APP012345", "12345", VariationKind::SemanticReformat, 1),
            ],
        }
    }

    #[test]
    fn test_recall_by_class_counts_rows() {
        let pairs = vec![pair("12345", "12346", 90.0, 0.2), pair("12345", "21345", 80.0, 2.0)];
        let report = evaluate(&dataset(), &pairs);

        assert_eq!(report.fuzzy, ClassRecall { total: 4, detected: 3 });
        assert_eq!(report.non_fuzzy, ClassRecall { total: 1, detected: 0 });
        assert_eq!(report.fuzzy.rate(), 0.75);
        assert_eq!(report.non_fuzzy.missed(), 1);
        assert_eq!(report.overall(), ClassRecall { total: 5, detected: 3 });
    }

    #[test]
    fn test_empty_class_rate_is_zero() {
        let pairs: Vec<CandidatePair> = Vec::new();
        let report = evaluate(&GeneratedDataset::default(), &pairs);
        assert_eq!(report.fuzzy.rate(), 0.0);
        assert_eq!(report.class(DifficultyClass::NonFuzzyDetectable).total, 0);
    }

    #[test]
    fn test_outcomes_per_variant() {
        let pairs = vec![pair("12346", "99999", 80.0, 1.0)];
        let outcomes = outcomes(&dataset(), &pairs);

        let detected: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.detected)
            .map(|o| o.record_key.as_str())
            .collect();
        assert_eq!(detected, vec!["12346"]);
        assert_eq!(outcomes.len(), 4);
    }

    #[test]
    fn test_pair_summary() {
        let pairs = vec![
            pair("a", "b", 80.0, 4.0),
            pair("c", "d", 90.0, 1.0),
            pair("e", "f", 100.0, 2.0),
            pair("g", "h", 90.0, 3.0),
        ];
        let summary = PairSummary::from_pairs(&pairs);

        assert_eq!(summary.pair_count, 4);
        assert_eq!(summary.mean_similarity, Some(90.0));
        assert_eq!(summary.mean_hours, Some(2.5));
        assert_eq!(summary.median_hours, Some(2.5));
        assert_eq!(summary.min_hours, Some(1.0));
        assert_eq!(summary.max_hours, Some(4.0));
    }

    #[test]
    fn test_pair_summary_empty() {
        let pairs: Vec<CandidatePair> = Vec::new();
        let summary = PairSummary::from_pairs(&pairs);
        assert_eq!(summary, PairSummary::default());
        assert_eq!(summary.median_hours, None);
    }
}
