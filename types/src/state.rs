//! Per-credit verification state machine.

use crate::time::Timestamp;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// Where a credit stands in its verification lifecycle.
///
/// `Unverified → Pending → {Verified, Rejected}`. `Verified` and `Rejected`
/// can move back to `Pending` only through a forced re-verification.
/// `PublishFailed` holds a verdict that never reached the ledger; the next
/// request for the credit starts a fresh wave.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerificationState {
    #[default]
    Unverified,
    /// A wave is in flight.
    Pending { ticket: u64, started_at: Timestamp },
    Verified { verdict: Verdict },
    Rejected { verdict: Verdict },
    PublishFailed {
        verdict: Verdict,
        attempts: u32,
        reason: String,
    },
}

impl VerificationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// `Verified` or `Rejected`.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Verified { .. } | Self::Rejected { .. })
    }

    /// The ticket of the in-flight wave, if any.
    pub fn pending_ticket(&self) -> Option<u64> {
        match self {
            Self::Pending { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    /// The last verdict computed for the credit, published or not.
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Verified { verdict }
            | Self::Rejected { verdict }
            | Self::PublishFailed { verdict, .. } => Some(verdict),
            Self::Unverified | Self::Pending { .. } => None,
        }
    }

    /// The resolved state a published verdict moves the credit into.
    pub fn resolved(verdict: Verdict) -> Self {
        if verdict.valid {
            Self::Verified { verdict }
        } else {
            Self::Rejected { verdict }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending { .. } => "pending",
            Self::Verified { .. } => "verified",
            Self::Rejected { .. } => "rejected",
            Self::PublishFailed { .. } => "publish_failed",
        }
    }
}
