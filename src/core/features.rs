use crate::config::DetectionConfig;
use crate::core::blocking::ScoredKeyPair;
use crate::core::record::{RecordTable, Trace, TraceEvent};
use crate::core::similarity::sequence_similarity;
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub string_similarity: f64,
    pub time_difference_hours: f64,
    pub same_actor: bool,
    /// 0 when either trace is too long to compare.
    pub activity_similarity: f64,
}

impl FeatureVector {
    pub fn same_actor_flag(&self) -> f64 {
        if self.same_actor { 1.0 } else { 0.0 }
    }
}

/// A retained candidate with its features and both traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub key_a: String,
    pub key_b: String,
    #[serde(flatten)]
    pub features: FeatureVector,
    pub trace_a: Vec<TraceEvent>,
    pub trace_b: Vec<TraceEvent>,
}

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    max_trace_events: usize,
}

impl FeatureExtractor {
    pub fn new(max_trace_events: usize) -> Self {
        Self { max_trace_events }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.max_trace_events)
    }

    /// Enrich a scored key pair; `None` when either key has no trace.
    pub fn extract(&self, scored: &ScoredKeyPair, table: &RecordTable) -> Option<CandidatePair> {
        let trace_a = table.trace(&scored.key_a).filter(|t| !t.is_empty())?;
        let trace_b = table.trace(&scored.key_b).filter(|t| !t.is_empty())?;

        Some(CandidatePair {
            key_a: scored.key_a.clone(),
            key_b: scored.key_b.clone(),
            features: self.features(trace_a, trace_b, scored.string_similarity),
            trace_a: trace_a.to_events(),
            trace_b: trace_b.to_events(),
        })
    }

    pub fn features(&self, trace_a: &Trace, trace_b: &Trace, string_similarity: f64) -> FeatureVector {
        let time_difference_hours = match (trace_a.first_timestamp(), trace_b.first_timestamp()) {
            (Some(a), Some(b)) => (a - b).num_milliseconds().abs() as f64 / MILLIS_PER_HOUR,
            _ => 0.0,
        };

        // missing actors never match, not even each other
        let same_actor = matches!(
            (trace_a.first_actor(), trace_b.first_actor()),
            (Some(a), Some(b)) if a == b
        );

        let activity_similarity =
            if trace_a.len() <= self.max_trace_events && trace_b.len() <= self.max_trace_events {
                sequence_similarity(&trace_a.activities(), &trace_b.activities())
            } else {
                0.0
            };

        FeatureVector {
            string_similarity,
            time_difference_hours,
            same_actor,
            activity_similarity,
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Record;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn scored(a: &str, b: &str) -> ScoredKeyPair {
        ScoredKeyPair {
            key_a: a.to_string(),
            key_b: b.to_string(),
            string_similarity: 90.0,
        }
    }

    #[test]
    fn test_time_actor_and_activity_features() {
        let table = RecordTable::new(vec![
            Record::new("12345", Some("u1"), "A_SUBMITTED", ts(0)),
            Record::new("12345", Some("u2"), "A_ACCEPTED", ts(60)),
            Record::new("12346", Some("u1"), "A_SUBMITTED", ts(90)),
            Record::new("12346", Some("u1"), "A_ACCEPTED", ts(120)),
        ])
        .unwrap();

        let pair = FeatureExtractor::default()
            .extract(&scored("12345", "12346"), &table)
            .unwrap();

        assert_eq!(pair.features.time_difference_hours, 1.5);
        assert!(pair.features.same_actor);
        assert_eq!(pair.features.same_actor_flag(), 1.0);
        assert_eq!(pair.features.activity_similarity, 100.0);
        assert_eq!(pair.features.string_similarity, 90.0);
        assert_eq!(pair.trace_a.len(), 2);
        assert_eq!(pair.trace_b[0].activity, "A_SUBMITTED");
    }

    #[test]
    fn test_time_difference_is_absolute() {
        let table = RecordTable::new(vec![
            Record::new("a1", Some("x"), "A", ts(30)),
            Record::new("a2", Some("y"), "A", ts(0)),
        ])
        .unwrap();

        let pair = FeatureExtractor::default()
            .extract(&scored("a1", "a2"), &table)
            .unwrap();
        assert_eq!(pair.features.time_difference_hours, 0.5);
        assert!(!pair.features.same_actor);
    }

    #[test]
    fn test_missing_actors_do_not_match() {
        let table = RecordTable::new(vec![
            Record::new("a1", None, "A", ts(0)),
            Record::new("a2", None, "A", ts(0)),
        ])
        .unwrap();

        let pair = FeatureExtractor::default()
            .extract(&scored("a1", "a2"), &table)
            .unwrap();
        assert!(!pair.features.same_actor);
    }

    #[test]
    fn test_long_traces_skip_activity_similarity() {
        let mut records = Vec::new();
        for i in 0..11 {
            records.push(Record::new("long1", Some("u"), "A_STEP", ts(i)));
            records.push(Record::new("long2", Some("u"), "A_STEP", ts(i)));
        }
        let table = RecordTable::new(records).unwrap();

        let pair = FeatureExtractor::default()
            .extract(&scored("long1", "long2"), &table)
            .unwrap();
        assert_eq!(pair.features.activity_similarity, 0.0);

        let pair = FeatureExtractor::new(11)
            .extract(&scored("long1", "long2"), &table)
            .unwrap();
        assert_eq!(pair.features.activity_similarity, 100.0);
    }

    #[test]
    fn test_unknown_key_yields_none() {
        let table = RecordTable::new(vec![Record::new("a1", None, "A", ts(0))]).unwrap();
        assert!(FeatureExtractor::default()
            .extract(&scored("a1", "zz"), &table)
            .is_none());
    }
}
