use serde::{Deserialize, Serialize};

/// Outcome of comparing two knock sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MatchResult {
    fn matched() -> Self {
        Self {
            is_match: true,
            reason: None,
        }
    }

    fn mismatch() -> Self {
        Self {
            is_match: false,
            reason: None,
        }
    }
}

/// Compare two knock sequences under a percentage deviation tolerance.
///
/// Sequences of different lengths never match and are not compared
/// element-wise. Otherwise each pair of intervals is scored as the
/// percentage difference relative to the second sequence, and the
/// comparison stops at the first pair exceeding `deviation`.
///
/// A zero reference interval always scores 100, even when both sides are
/// zero, so a pair of zeros only passes at a tolerance of 100 or more.
pub fn compare_sequences(seq1: &[u32], seq2: &[u32], deviation: f64) -> MatchResult {
    if seq1.len() != seq2.len() {
        return MatchResult {
            is_match: false,
            reason: Some("length mismatch".to_string()),
        };
    }

    for (&a, &b) in seq1.iter().zip(seq2.iter()) {
        let percent_diff = if b == 0 {
            100.0
        } else {
            a.abs_diff(b) as f64 * 100.0 / b as f64
        };

        if percent_diff > deviation {
            return MatchResult::mismatch();
        }
    }

    MatchResult::matched()
}
