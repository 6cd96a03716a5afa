//! The registry client capability.

use async_trait::async_trait;
use carbon_types::{CreditId, QueryOutcome, RegistrySource};
use std::time::Duration;

/// Default bound on a single registry query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches one registry's record for a credit.
///
/// Implementations are stateless apart from connection pools and must be safe
/// to call from many tasks at once. `query` is infallible by contract; it may
/// still run longer than [`timeout`](RegistryClient::timeout), so callers
/// enforce the bound themselves.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Which registry this client speaks to.
    fn source(&self) -> RegistrySource;

    /// Upper bound the caller should allow for one query.
    fn timeout(&self) -> Duration {
        DEFAULT_QUERY_TIMEOUT
    }

    async fn query(&self, credit: &CreditId) -> QueryOutcome;
}
