// Root-cause classification as an ordered rule list. Rules are evaluated
// top-down and the first match wins; pairs no rule claims fall through to
// manual review.

use crate::core::features::{CandidatePair, FeatureVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unknown causal label: {0}")]
pub struct UnknownLabel(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CausalLabel {
    #[serde(rename = "Manual re-entry by same user (likely typo/correction)")]
    ManualReentry,
    #[serde(rename = "Collaborative entry by multiple users")]
    CollaborativeEntry,
    #[serde(rename = "System retry/retransmission")]
    SystemRetry,
    #[serde(rename = "Data migration/import duplicate")]
    DataMigration,
    #[serde(rename = "Process workflow duplication")]
    WorkflowDuplication,
    #[serde(rename = "User training/testing scenario")]
    TrainingScenario,
    #[serde(rename = "Complex duplicate scenario requiring manual review")]
    ManualReview,
}

impl CausalLabel {
    pub const ALL: [CausalLabel; 7] = [
        CausalLabel::ManualReentry,
        CausalLabel::CollaborativeEntry,
        CausalLabel::SystemRetry,
        CausalLabel::DataMigration,
        CausalLabel::WorkflowDuplication,
        CausalLabel::TrainingScenario,
        CausalLabel::ManualReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CausalLabel::ManualReentry => "Manual re-entry by same user (likely typo/correction)",
            CausalLabel::CollaborativeEntry => "Collaborative entry by multiple users",
            CausalLabel::SystemRetry => "System retry/retransmission",
            CausalLabel::DataMigration => "Data migration/import duplicate",
            CausalLabel::WorkflowDuplication => "Process workflow duplication",
            CausalLabel::TrainingScenario => "User training/testing scenario",
            CausalLabel::ManualReview => "Complex duplicate scenario requiring manual review",
        }
    }
}

impl fmt::Display for CausalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CausalLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CausalLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// What a rule predicate sees: both keys and their feature vector.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub key_a: &'a str,
    pub key_b: &'a str,
    pub features: &'a FeatureVector,
}

pub struct Rule {
    pub label: CausalLabel,
    pub matches: fn(&RuleInput<'_>) -> bool,
}

fn manual_reentry(input: &RuleInput<'_>) -> bool {
    let f = input.features;
    f.same_actor && f.time_difference_hours <= 1.0 && f.string_similarity >= 85.0
}

fn collaborative_entry(input: &RuleInput<'_>) -> bool {
    let f = input.features;
    !f.same_actor && f.time_difference_hours <= 2.0 && f.string_similarity >= 80.0
}

fn system_retry(input: &RuleInput<'_>) -> bool {
    (input.key_a.starts_with('R') || input.key_b.starts_with('R'))
        && input.features.time_difference_hours >= 2.0
}

fn data_migration(input: &RuleInput<'_>) -> bool {
    let f = input.features;
    f.time_difference_hours >= 24.0 && f.activity_similarity >= 90.0
}

fn workflow_duplication(input: &RuleInput<'_>) -> bool {
    let f = input.features;
    f.time_difference_hours <= 0.5 && f.activity_similarity >= 95.0
}

fn training_scenario(input: &RuleInput<'_>) -> bool {
    let f = input.features;
    f.string_similarity >= 90.0 && f.time_difference_hours <= 0.1
}

/// Ordered rules; position is the tie-break when predicates overlap.
pub const RULES: [Rule; 6] = [
    Rule {
        label: CausalLabel::ManualReentry,
        matches: manual_reentry,
    },
    Rule {
        label: CausalLabel::CollaborativeEntry,
        matches: collaborative_entry,
    },
    Rule {
        label: CausalLabel::SystemRetry,
        matches: system_retry,
    },
    Rule {
        label: CausalLabel::DataMigration,
        matches: data_migration,
    },
    Rule {
        label: CausalLabel::WorkflowDuplication,
        matches: workflow_duplication,
    },
    Rule {
        label: CausalLabel::TrainingScenario,
        matches: training_scenario,
    },
];

pub const FALLBACK_LABEL: CausalLabel = CausalLabel::ManualReview;

/// Index into [`RULES`] of the first matching rule.
pub fn matching_rule(key_a: &str, key_b: &str, features: &FeatureVector) -> Option<usize> {
    let input = RuleInput {
        key_a,
        key_b,
        features,
    };
    RULES.iter().position(|rule| (rule.matches)(&input))
}

pub fn classify(key_a: &str, key_b: &str, features: &FeatureVector) -> CausalLabel {
    matching_rule(key_a, key_b, features)
        .map(|idx| RULES[idx].label)
        .unwrap_or(FALLBACK_LABEL)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPair {
    #[serde(flatten)]
    pub pair: CandidatePair,
    pub causal_label: CausalLabel,
}

impl ClassifiedPair {
    pub fn from_pair(pair: CandidatePair) -> Self {
        let causal_label = classify(&pair.key_a, &pair.key_b, &pair.features);
        Self { pair, causal_label }
    }
}
