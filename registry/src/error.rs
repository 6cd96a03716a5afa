use carbon_types::FailureReason;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    SourceUnavailable(String),

    #[error("registry query timed out after {0:?}")]
    SourceTimeout(Duration),

    #[error("invalid response from registry: {0}")]
    InvalidResponse(String),

    #[error("registry {0} is already registered")]
    DuplicateSource(String),

    #[error("{0}")]
    Other(String),
}

impl From<RegistryError> for FailureReason {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::SourceTimeout(after) => FailureReason::Timeout {
                after_ms: after.as_millis() as u64,
            },
            RegistryError::InvalidResponse(msg) => FailureReason::Malformed(msg),
            other => FailureReason::Unavailable(other.to_string()),
        }
    }
}
