//! Verdict publication.
//!
//! A computed verdict is handed to the downstream ledger as a
//! [`VerdictSubmission`]. Submissions are keyed by credit and overwrite, so
//! delivering the same one twice is harmless; the [`RetryingPublisher`]
//! relies on that to retry transient failures.

pub mod error;
pub mod http;
pub mod log;
pub mod publisher;
pub mod retry;
pub mod submission;

pub use error::{PublishError, PublishFailure};
pub use http::HttpLedgerPublisher;
pub use log::LogPublisher;
pub use publisher::VerdictPublisher;
pub use retry::{PublishReceipt, RetryPolicy, RetryingPublisher};
pub use submission::VerdictSubmission;
