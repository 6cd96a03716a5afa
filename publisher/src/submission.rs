//! The payload handed to the ledger.

use carbon_types::{CreditId, Verdict};
use serde::{Deserialize, Serialize};

/// One ledger write: validity, score and contributing sources for a credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSubmission {
    pub credit_id: CreditId,
    pub is_valid: bool,
    pub quality_score: u8,
    pub sources: Vec<String>,
}

impl VerdictSubmission {
    pub fn new(credit: &CreditId, verdict: &Verdict) -> Self {
        Self {
            credit_id: credit.clone(),
            is_valid: verdict.valid,
            quality_score: verdict.score,
            sources: verdict.source_names(),
        }
    }
}
