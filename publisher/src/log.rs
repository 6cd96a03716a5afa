//! Publisher that records verdicts in the structured log only.

use crate::error::PublishError;
use crate::publisher::VerdictPublisher;
use crate::submission::VerdictSubmission;
use async_trait::async_trait;

/// Emits each submission as a `tracing` event. Used when no ledger endpoint
/// is configured (dry runs, local development).
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl VerdictPublisher for LogPublisher {
    async fn submit(&self, submission: &VerdictSubmission) -> Result<(), PublishError> {
        tracing::info!(
            credit = %submission.credit_id,
            valid = submission.is_valid,
            score = submission.quality_score,
            sources = ?submission.sources,
            "verdict published to log"
        );
        Ok(())
    }
}
