//! Bounded retries with exponential backoff around any publisher.

use crate::error::{PublishError, PublishFailure};
use crate::publisher::VerdictPublisher;
use crate::submission::VerdictSubmission;

use carbon_types::{CreditId, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How hard to try before declaring a verdict undeliverable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Cap on the delay between retries.
    pub max_backoff_ms: u64,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff_ms = backoff.as_millis() as u64;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let ms = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exp);
        Duration::from_millis(ms.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Successful delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Attempts it took, including the successful one.
    pub attempts: u32,
}

/// Wraps a publisher with the [`RetryPolicy`].
///
/// Transient errors are retried with backoff; a rejection ends the attempt
/// sequence at once.
#[derive(Clone)]
pub struct RetryingPublisher {
    inner: Arc<dyn VerdictPublisher>,
    policy: RetryPolicy,
}

impl RetryingPublisher {
    pub fn new(inner: Arc<dyn VerdictPublisher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver `verdict` for `credit`.
    pub async fn publish(
        &self,
        credit: &CreditId,
        verdict: &Verdict,
    ) -> Result<PublishReceipt, PublishFailure> {
        let submission = VerdictSubmission::new(credit, verdict);
        let max = self.policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.inner.submit(&submission).await {
                Ok(()) => {
                    tracing::debug!(%credit, attempt, "verdict delivered");
                    return Ok(PublishReceipt { attempts: attempt });
                }
                Err(e @ PublishError::Rejected(_)) => {
                    tracing::error!(%credit, attempt, error = %e, "ledger rejected verdict");
                    return Err(PublishFailure {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) if attempt >= max => {
                    tracing::error!(%credit, attempt, error = %e, "verdict publish retries exhausted");
                    return Err(PublishFailure {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let backoff = self.policy.backoff_after(attempt);
                    tracing::warn!(
                        %credit,
                        attempt,
                        max_attempts = max,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "verdict publish failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
