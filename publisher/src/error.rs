use thiserror::Error;

/// Why a single submission attempt failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Worth retrying: transport failure, timeout, 5xx.
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// The ledger refused the submission; retrying will not help.
    #[error("ledger rejected submission: {0}")]
    Rejected(String),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A verdict that could not be delivered within the retry budget.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("publish failed after {attempts} attempt(s): {last_error}")]
pub struct PublishFailure {
    pub attempts: u32,
    pub last_error: PublishError,
}
