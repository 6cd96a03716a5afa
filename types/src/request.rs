//! Inbound verification requests.

use crate::credit::CreditId;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Whether a request may override an already resolved verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Skip credits that are already `Verified` or `Rejected`.
    #[default]
    Normal,
    /// Re-verify a resolved credit, overwriting its verdict.
    Force,
}

impl RequestMode {
    pub fn from_force(force: bool) -> Self {
        if force {
            Self::Force
        } else {
            Self::Normal
        }
    }
}

/// A request to verify one credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub credit: CreditId,
    /// Who asked (a trading layer, an operator, ...). Free-form.
    pub requester: String,
    /// Monotonically assigned by the coordinator; later requests get larger tickets.
    pub ticket: u64,
    pub received_at: Timestamp,
    pub mode: RequestMode,
}
