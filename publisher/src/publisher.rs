//! The downstream publication capability.

use crate::error::PublishError;
use crate::submission::VerdictSubmission;
use async_trait::async_trait;

/// Delivers one verdict submission to the ledger.
///
/// Implementations must be idempotent per credit: the ledger stores the
/// latest submission for a credit, it does not append.
#[async_trait]
pub trait VerdictPublisher: Send + Sync {
    async fn submit(&self, submission: &VerdictSubmission) -> Result<(), PublishError>;
}
