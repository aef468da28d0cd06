// Blocking and bounded candidate search.
//
// Keys are partitioned into blocks by exact character length and sorted
// within each block; every key is scored only against a sliding window of its
// sorted successors. A global comparison budget caps the total work: once it
// is spent, the search stops and the remaining blocks are never examined.

use crate::config::{ConfigError, DetectionConfig};
use crate::core::similarity::string_similarity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Hard cap on the budget relative to the number of distinct keys.
pub const BUDGET_PER_KEY: usize = 10;
pub const DEFAULT_WINDOW: usize = 50;

/// Two keys from the same block whose similarity met the threshold.
/// `key_a` sorts before `key_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredKeyPair {
    pub key_a: String,
    pub key_b: String,
    pub string_similarity: f64,
}

/// Work accounting for one search. `exhausted` means at least one scheduled
/// comparison was skipped because the budget ran out, so results are partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub comparisons_attempted: usize,
    pub budget: usize,
    pub exhausted: bool,
    pub blocks: usize,
    pub blocks_examined: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub pairs: Vec<ScoredKeyPair>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone)]
pub struct CandidateSearch {
    threshold: f64,
    max_comparisons: usize,
    window: usize,
}

impl CandidateSearch {
    pub fn new(threshold: f64, max_comparisons: usize, window: usize) -> Result<Self, ConfigError> {
        let config = DetectionConfig {
            threshold,
            max_comparisons,
            window,
            ..Default::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            threshold: config.threshold,
            max_comparisons: config.max_comparisons,
            window: config.window,
        })
    }

    /// Effective budget for `distinct_keys` keys.
    pub fn budget_for(&self, distinct_keys: usize) -> usize {
        self.max_comparisons
            .min(distinct_keys.saturating_mul(BUDGET_PER_KEY))
    }

    pub fn search<'a, I>(&self, keys: I) -> SearchOutcome
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = keys.into_iter().collect();
        let budget = self.budget_for(distinct.len());

        let mut blocks: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for key in distinct {
            blocks.entry(key.chars().count()).or_default().push(key);
        }

        let mut stats = SearchStats {
            budget,
            blocks: blocks.len(),
            ..Default::default()
        };
        let mut pairs = Vec::new();

        'blocks: for (length, mut block) in blocks {
            if block.len() < 2 {
                continue;
            }
            if stats.comparisons_attempted >= budget {
                stats.exhausted = true;
                break;
            }
            block.sort_unstable();
            stats.blocks_examined += 1;
            log::debug!("Scanning block of length {} with {} keys", length, block.len());

            for (i, key_a) in block.iter().enumerate() {
                let end = (i + 1 + self.window).min(block.len());
                for key_b in &block[i + 1..end] {
                    if stats.comparisons_attempted >= budget {
                        stats.exhausted = true;
                        break 'blocks;
                    }
                    stats.comparisons_attempted += 1;

                    let similarity = string_similarity(key_a, key_b);
                    if similarity >= self.threshold {
                        pairs.push(ScoredKeyPair {
                            key_a: key_a.to_string(),
                            key_b: key_b.to_string(),
                            string_similarity: similarity,
                        });
                    }
                }
            }
        }

        if stats.exhausted {
            log::warn!(
                "Comparison budget of {} exhausted after {} of {} blocks; results are partial",
                budget,
                stats.blocks_examined,
                stats.blocks
            );
        }
        log::info!(
            "Compared {} key pairs, retained {} candidates at threshold {}",
            stats.comparisons_attempted,
            pairs.len(),
            self.threshold
        );

        SearchOutcome { pairs, stats }
    }
}

/// Run a search with the default window.
pub fn find_candidates<'a, I>(
    keys: I,
    threshold: f64,
    max_comparisons: usize,
) -> Result<SearchOutcome, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let search = CandidateSearch::new(threshold, max_comparisons, DEFAULT_WINDOW)?;
    Ok(search.search(keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}", 100_000 + i * 3)).collect()
    }

    #[test]
    fn test_typo_pair_is_found() {
        let outcome = find_candidates(["12345", "12346", "99999"], 80.0, 1000).unwrap();

        assert_eq!(outcome.pairs.len(), 1);
        let pair = &outcome.pairs[0];
        assert_eq!((pair.key_a.as_str(), pair.key_b.as_str()), ("12345", "12346"));
        assert!(pair.string_similarity >= 80.0);
        assert!(!outcome.stats.exhausted);
    }

    #[test]
    fn test_keys_of_different_length_are_never_paired() {
        let outcome = find_candidates(["12345", "APP012345", "1234", "123456"], 0.0, 1000).unwrap();

        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.stats.comparisons_attempted, 0);
        assert_eq!(outcome.stats.blocks, 4);
    }

    #[test]
    fn test_soundness_on_mixed_keys() {
        let mut keys = numeric_keys(60);
        keys.extend(["APP100000", "APP100003", "R-1", "R-2", "abc", "abd"].map(String::from));
        let outcome = find_candidates(keys.iter().map(String::as_str), 80.0, 10_000).unwrap();

        assert!(!outcome.pairs.is_empty());
        for pair in &outcome.pairs {
            assert_eq!(pair.key_a.chars().count(), pair.key_b.chars().count());
            assert!(pair.string_similarity >= 80.0);
            assert!(pair.key_a < pair.key_b);
        }
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let keys = numeric_keys(200);
        for budget in [0, 1, 7, 100, 999] {
            let outcome = find_candidates(keys.iter().map(String::as_str), 50.0, budget).unwrap();
            assert!(outcome.stats.comparisons_attempted <= budget);
            assert_eq!(outcome.stats.comparisons_attempted, budget);
            assert!(outcome.stats.exhausted);
        }
    }

    #[test]
    fn test_budget_is_capped_by_key_count() {
        let keys = numeric_keys(30);
        let outcome = find_candidates(keys.iter().map(String::as_str), 0.0, 1_000_000).unwrap();

        assert_eq!(outcome.stats.budget, 300);
        assert!(outcome.stats.comparisons_attempted <= 300);
    }

    #[test]
    fn test_window_bounds_comparisons_per_key() {
        let keys = numeric_keys(10);
        let search = CandidateSearch::new(0.0, 10_000, 2).unwrap();
        let outcome = search.search(keys.iter().map(String::as_str));

        // each key sees at most two successors: 8 * 2 + 1
        assert_eq!(outcome.stats.comparisons_attempted, 17);
        assert!(!outcome.stats.exhausted);
    }

    #[test]
    fn test_default_window_is_fifty_successors() {
        let mut keys = numeric_keys(60);
        // singleton blocks lift the key-count cap without adding comparisons
        keys.extend((7..187).map(|len| "x".repeat(len)));
        let outcome = find_candidates(keys.iter().map(String::as_str), 100.0, 10_000).unwrap();

        // keys 0..=9 see 50 successors each, the remaining 50 see 49..=0
        let expected = 10 * 50 + (0..50).sum::<usize>();
        assert_eq!(outcome.stats.comparisons_attempted, expected);
    }

    #[test]
    fn test_duplicate_keys_are_compared_once() {
        let outcome = find_candidates(["12345", "12345", "12346"], 80.0, 100).unwrap();
        assert_eq!(outcome.stats.comparisons_attempted, 1);
        assert_eq!(outcome.pairs.len(), 1);
    }

    #[test]
    fn test_exhaustion_leaves_later_blocks_unexamined() {
        let keys = ["1000", "1001", "1002", "20000", "20001"];
        let outcome = find_candidates(keys, 0.0, 3).unwrap();

        assert!(outcome.stats.exhausted);
        assert_eq!(outcome.stats.blocks_examined, 1);
        assert!(outcome.pairs.iter().all(|p| p.key_a.len() == 4));
    }

    #[test]
    fn test_invalid_threshold_fails_fast() {
        assert!(matches!(
            find_candidates(["1", "2"], 120.0, 10),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }
}
