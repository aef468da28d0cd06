use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record {index} has an empty record key")]
    EmptyKey { index: usize },

    #[error("Record {record_key} has a non-finite amount: {amount}")]
    InvalidAmount { record_key: String, amount: f64 },
}

/// A single event occurrence in the log, keyed by its case/application identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_key: String,
    pub actor: Option<String>,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl Record {
    pub fn new(
        record_key: impl Into<String>,
        actor: Option<&str>,
        activity: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            record_key: record_key.into(),
            actor: actor.map(str::to_string),
            activity: activity.into(),
            timestamp,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Projection of a record used in the candidate-pair table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub activity: String,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&Record> for TraceEvent {
    fn from(record: &Record) -> Self {
        Self {
            activity: record.activity.clone(),
            actor: record.actor.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// All records sharing one key, ordered by timestamp ascending.
#[derive(Debug, Clone)]
pub struct Trace {
    pub record_key: String,
    pub events: Vec<Record>,
}

impl Trace {
    fn from_events(record_key: String, mut events: Vec<Record>) -> Self {
        // stable sort keeps ingestion order for equal timestamps
        events.sort_by_key(|r| r.timestamp);
        Self { record_key, events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|r| r.timestamp)
    }

    /// Actor of the earliest event, treated as the responsible actor.
    pub fn first_actor(&self) -> Option<&str> {
        self.events.first().and_then(|r| r.actor.as_deref())
    }

    pub fn activities(&self) -> Vec<&str> {
        self.events.iter().map(|r| r.activity.as_str()).collect()
    }

    /// First monetary amount present along the trace.
    pub fn amount(&self) -> Option<f64> {
        self.events.iter().find_map(|r| r.amount)
    }

    pub fn to_events(&self) -> Vec<TraceEvent> {
        self.events.iter().map(TraceEvent::from).collect()
    }
}

/// Validated, in-memory record table grouped into traces.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    traces: BTreeMap<String, Trace>,
    actors: BTreeSet<String>,
    record_count: usize,
}

impl RecordTable {
    pub fn new(records: Vec<Record>) -> Result<Self, RecordError> {
        let record_count = records.len();
        let mut grouped: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        let mut actors = BTreeSet::new();

        for (index, record) in records.into_iter().enumerate() {
            if record.record_key.is_empty() {
                return Err(RecordError::EmptyKey { index });
            }
            if let Some(amount) = record.amount {
                if !amount.is_finite() {
                    return Err(RecordError::InvalidAmount {
                        record_key: record.record_key,
                        amount,
                    });
                }
            }
            if let Some(actor) = &record.actor {
                actors.insert(actor.clone());
            }
            grouped
                .entry(record.record_key.clone())
                .or_default()
                .push(record);
        }

        let traces = grouped
            .into_iter()
            .map(|(key, events)| (key.clone(), Trace::from_events(key, events)))
            .collect();

        Ok(Self {
            traces,
            actors,
            record_count,
        })
    }

    pub fn trace(&self, record_key: &str) -> Option<&Trace> {
        self.traces.get(record_key)
    }

    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.values()
    }

    /// Distinct record keys in sort order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }

    pub fn contains_key(&self, record_key: &str) -> bool {
        self.traces.contains_key(record_key)
    }

    pub fn key_count(&self) -> usize {
        self.traces.len()
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Distinct non-null actors in sort order.
    pub fn actors(&self) -> &BTreeSet<String> {
        &self.actors
    }

    /// Monetary amount for a key, 0 when the key or the attribute is absent.
    pub fn amount_for(&self, record_key: &str) -> f64 {
        self.trace(record_key)
            .and_then(Trace::amount)
            .unwrap_or(0.0)
    }

    /// Flatten back into records, trace by trace.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.traces.values().flat_map(|t| t.events.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_traces_are_grouped_and_time_ordered() {
        let table = RecordTable::new(vec![
            Record::new("100", Some("u2"), "A_ACCEPTED", ts(30)),
            Record::new("200", Some("u3"), "A_SUBMITTED", ts(5)),
            Record::new("100", Some("u1"), "A_SUBMITTED", ts(0)),
        ])
        .unwrap();

        assert_eq!(table.key_count(), 2);
        assert_eq!(table.record_count(), 3);

        let trace = table.trace("100").unwrap();
        assert_eq!(trace.activities(), vec!["A_SUBMITTED", "A_ACCEPTED"]);
        assert_eq!(trace.first_actor(), Some("u1"));
        assert_eq!(trace.first_timestamp(), Some(ts(0)));
    }

    #[test]
    fn test_actors_skip_missing_values() {
        let table = RecordTable::new(vec![
            Record::new("1", Some("b"), "A", ts(0)),
            Record::new("2", None, "A", ts(0)),
            Record::new("3", Some("a"), "A", ts(0)),
        ])
        .unwrap();

        let actors: Vec<&str> = table.actors().iter().map(String::as_str).collect();
        assert_eq!(actors, vec!["a", "b"]);
    }

    #[test]
    fn test_amount_defaults_to_zero() {
        let table = RecordTable::new(vec![
            Record::new("1", None, "A", ts(0)),
            Record::new("2", None, "A", ts(0)).with_amount(5000.0),
        ])
        .unwrap();

        assert_eq!(table.amount_for("1"), 0.0);
        assert_eq!(table.amount_for("2"), 5000.0);
        assert_eq!(table.amount_for("missing"), 0.0);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = RecordTable::new(vec![
            Record::new("1", None, "A", ts(0)),
            Record::new("", None, "A", ts(0)),
        ])
        .unwrap_err();

        assert!(matches!(err, RecordError::EmptyKey { index: 1 }));
    }

    #[test]
    fn test_non_finite_amount_is_rejected() {
        let err = RecordTable::new(vec![Record::new("1", None, "A", ts(0)).with_amount(f64::NAN)])
            .unwrap_err();

        assert!(matches!(err, RecordError::InvalidAmount { .. }));
    }
}
