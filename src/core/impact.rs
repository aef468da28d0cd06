use crate::core::classifier::{CausalLabel, ClassifiedPair};
use crate::core::record::RecordTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
            RiskTier::Critical => "Critical",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskTier::Low => "Implement input validation and auto-save features",
            RiskTier::Medium => "Implement real-time duplicate checking and user coordination",
            RiskTier::High => "Review system integration and data migration processes",
            RiskTier::Critical => "Immediate manual review and process audit required",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn risk_tier(label: CausalLabel) -> RiskTier {
    match label {
        CausalLabel::ManualReentry | CausalLabel::TrainingScenario => RiskTier::Low,
        CausalLabel::CollaborativeEntry | CausalLabel::WorkflowDuplication => RiskTier::Medium,
        CausalLabel::SystemRetry | CausalLabel::DataMigration => RiskTier::High,
        CausalLabel::ManualReview => RiskTier::Critical,
    }
}

/// Tier for a free-text label; anything outside the known set is Critical.
pub fn risk_tier_for_label(label: &str) -> RiskTier {
    label
        .parse::<CausalLabel>()
        .map(risk_tier)
        .unwrap_or(RiskTier::Critical)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub record_key_a: String,
    pub record_key_b: String,
    pub causal_label: CausalLabel,
    pub risk_tier: RiskTier,
    pub max_financial_amount: f64,
    pub recommendation: String,
    pub time_difference_hours: f64,
}

/// Score a classified pair, looking up amounts in the full record table.
pub fn assess(pair: &ClassifiedPair, table: &RecordTable) -> ImpactRecord {
    let tier = risk_tier(pair.causal_label);
    let amount_a = table.amount_for(&pair.pair.key_a);
    let amount_b = table.amount_for(&pair.pair.key_b);

    ImpactRecord {
        record_key_a: pair.pair.key_a.clone(),
        record_key_b: pair.pair.key_b.clone(),
        causal_label: pair.causal_label,
        risk_tier: tier,
        max_financial_amount: amount_a.max(amount_b),
        recommendation: tier.recommendation().to_string(),
        time_difference_hours: pair.pair.features.time_difference_hours,
    }
}

pub fn assess_all(pairs: &[ClassifiedPair], table: &RecordTable) -> Vec<ImpactRecord> {
    pairs.iter().map(|pair| assess(pair, table)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub by_tier: BTreeMap<RiskTier, usize>,
    pub total_exposure: f64,
}

impl RiskDistribution {
    pub fn from_records(records: &[ImpactRecord]) -> Self {
        let mut distribution = Self::default();
        for record in records {
            *distribution.by_tier.entry(record.risk_tier).or_default() += 1;
            distribution.total_exposure += record.max_financial_amount;
        }
        distribution
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        self.by_tier.get(&tier).copied().unwrap_or(0)
    }
}
