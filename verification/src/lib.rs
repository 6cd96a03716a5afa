//! Cross-registry credit verification.
//!
//! A credit is checked against every configured registry at once:
//! 1. **Fan-out**: one query per registry, each bounded by its own timeout.
//! 2. **Aggregation**: the complete outcome set is scored into one verdict.
//! 3. **Publication**: the verdict is written to the ledger, retried on
//!    transient faults.
//!
//! The [`VerificationCoordinator`] guarantees at most one wave per credit at a
//! time; concurrent requests for the same credit share that wave's result.

pub mod aggregator;
pub mod coordinator;
pub mod error;

pub use aggregator::ResultAggregator;
pub use coordinator::{Disposition, RequestResult, VerificationCoordinator, DEFAULT_MAX_TRACKED};
pub use error::{AggregationError, VerificationError};
