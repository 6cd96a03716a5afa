//! Registry records and the ways a single registry query can resolve.

use crate::error::TypesError;
use crate::source::RegistrySource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest quality a registry can report.
pub const MAX_QUALITY: u8 = 100;

/// Descriptive fields a registry may attach to a record.
///
/// Informational only; none of these affect the verdict.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub vintage: Option<u16>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub methodology: Option<String>,
}

/// One registry's answer about one credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub source: RegistrySource,
    /// Whether the registry knows the credit.
    pub exists: bool,
    /// Registry-assigned quality, 0–100.
    pub quality: u8,
    /// Whether the credit has been retired at this registry.
    pub retired: bool,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl RegistryRecord {
    /// Build a record, rejecting qualities above [`MAX_QUALITY`].
    pub fn new(
        source: RegistrySource,
        exists: bool,
        quality: u32,
        retired: bool,
    ) -> Result<Self, TypesError> {
        let quality = u8::try_from(quality)
            .ok()
            .filter(|q| *q <= MAX_QUALITY)
            .ok_or(TypesError::QualityOutOfRange(quality))?;
        Ok(Self {
            source,
            exists,
            quality,
            retired,
            metadata: RecordMetadata::default(),
        })
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Why a query produced no usable answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The query exceeded its bound.
    Timeout { after_ms: u64 },
    /// The registry could not be reached.
    Unavailable(String),
    /// The registry answered with something unparseable.
    Malformed(String),
    /// The query task died before producing an outcome.
    Aborted(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            Self::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Aborted(msg) => write!(f, "aborted: {msg}"),
        }
    }
}

/// Result of querying one registry for one credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success(RegistryRecord),
    NotFound,
    Failure(FailureReason),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the registry answered at all (a record or a definite not-found).
    pub fn is_answer(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }
}

/// A [`QueryOutcome`] attributed to the registry that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: RegistrySource,
    pub outcome: QueryOutcome,
}

impl SourceOutcome {
    pub fn new(source: RegistrySource, outcome: QueryOutcome) -> Self {
        Self { source, outcome }
    }
}
