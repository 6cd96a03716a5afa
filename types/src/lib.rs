//! Fundamental types for carbon credit verification.
//!
//! This crate defines the data model shared by every other crate in the workspace:
//! credit identifiers, registry records and query outcomes, verdicts, the
//! per-credit verification state machine, and the scoring policy.

pub mod credit;
pub mod error;
pub mod outcome;
pub mod params;
pub mod request;
pub mod source;
pub mod state;
pub mod time;
pub mod verdict;

pub use credit::CreditId;
pub use error::TypesError;
pub use outcome::{FailureReason, QueryOutcome, RecordMetadata, RegistryRecord, SourceOutcome};
pub use params::ScoringPolicy;
pub use request::{RequestMode, VerificationRequest};
pub use source::RegistrySource;
pub use state::VerificationState;
pub use time::Timestamp;
pub use verdict::{SentinelTag, Verdict, VerdictSources};
