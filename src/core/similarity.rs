//! Edit-distance based similarity scores on a 0-100 scale.

use strsim::levenshtein;

/// Levenshtein similarity normalized over the combined length of both strings.
///
/// Case-sensitive. Identical strings score 100; a string compared against the
/// empty string scores 0.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100.0;
    }
    let distance = levenshtein(a, b);
    100.0 * total.saturating_sub(distance) as f64 / total as f64
}

/// Similarity of two token sequences rendered as space-joined strings.
///
/// Token order matters: the same tokens in a different order score lower.
pub fn sequence_similarity<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    string_similarity(&join_tokens(a), &join_tokens(b))
}

fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_scores_100() {
        for s in ["", "a", "12345", "APP012345", "ñandú"] {
            assert_eq!(string_similarity(s, s), 100.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let samples = ["12345", "12346", "21345", "1234", "abc", "", "APP012345"];
        for a in samples {
            for b in samples {
                assert_eq!(string_similarity(a, b), string_similarity(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_single_substitution() {
        assert_eq!(string_similarity("12345", "12346"), 90.0);
    }

    #[test]
    fn test_degrades_with_edit_distance() {
        let one = string_similarity("12345", "12346");
        let two = string_similarity("12345", "12366");
        let five = string_similarity("12345", "67890");
        assert!(one > two);
        assert!(two > five);
    }

    #[test]
    fn test_case_sensitive() {
        assert!(string_similarity("abc", "ABC") < 100.0);
    }

    #[test]
    fn test_empty_against_non_empty_is_zero() {
        assert_eq!(string_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_sequence_similarity_is_order_sensitive() {
        let a = ["A_SUBMITTED", "A_PARTLYSUBMITTED", "A_PREACCEPTED"];
        let reordered = ["A_PREACCEPTED", "A_SUBMITTED", "A_PARTLYSUBMITTED"];

        assert_eq!(sequence_similarity(&a, &a), 100.0);
        assert!(sequence_similarity(&a, &reordered) < 100.0);
    }

    #[test]
    fn test_sequence_similarity_matches_joined_strings() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["x".to_string(), "z".to_string()];
        assert_eq!(sequence_similarity(&a, &b), string_similarity("x y", "x z"));
    }
}
