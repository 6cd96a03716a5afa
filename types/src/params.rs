//! Scoring thresholds and penalties used by the aggregator.

use serde::{Deserialize, Serialize};

/// Tunable policy for turning registry records into a verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Minimum final score for a credit to be valid.
    pub min_valid_score: u8,
    /// Number of registries that must confirm existence to avoid the
    /// low-corroboration penalty.
    pub min_corroboration: usize,
    /// Deducted when any registry reports the credit retired.
    pub retired_penalty: u8,
    /// Deducted when fewer than `min_corroboration` registries confirm existence.
    pub low_corroboration_penalty: u8,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            min_valid_score: 40,
            min_corroboration: 2,
            retired_penalty: 20,
            low_corroboration_penalty: 10,
        }
    }
}
