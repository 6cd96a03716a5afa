use carbon_types::{CreditId, RegistrySource};
use thiserror::Error;

/// Errors surfaced to whoever requested a verification.
///
/// Registry faults never appear here; they are part of the evidence.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("verdict for credit {credit} could not be published after {attempts} attempt(s): {reason}")]
    PublishFailed {
        credit: CreditId,
        attempts: u32,
        reason: String,
    },

    #[error("invariant violated for credit {credit}: {detail}")]
    InvariantViolation { credit: CreditId, detail: String },

    #[error("verification of credit {0} was cancelled")]
    Cancelled(CreditId),

    #[error("verification wave for credit {0} ended without a result")]
    WaveLost(CreditId),

    #[error("cannot track credit {credit}: all {limit} tracked credits have a wave in flight")]
    AtCapacity { credit: CreditId, limit: usize },

    #[error("no registries configured")]
    NoRegistries,
}

/// Why the aggregator refused an outcome set.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no outcomes to aggregate")]
    Empty,

    #[error("registry {0} reported more than once")]
    DuplicateSource(RegistrySource),

    #[error("registry {registry} reported quality {quality}, above 100")]
    QualityOutOfRange { registry: RegistrySource, quality: u8 },
}
