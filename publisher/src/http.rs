//! HTTP publisher for the ledger's verification endpoint.

use crate::error::PublishError;
use crate::publisher::VerdictPublisher;
use crate::submission::VerdictSubmission;

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

/// Default timeout for one submission attempt.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes verdicts with `PUT {endpoint}/verifications/{credit}`.
///
/// `PUT` to a per-credit resource is an overwrite, which is what makes
/// repeated delivery safe.
pub struct HttpLedgerPublisher {
    base: Url,
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
}

impl HttpLedgerPublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PublishError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let endpoint = endpoint.into();
        let base = Url::parse(&endpoint)
            .map_err(|e| PublishError::Rejected(format!("invalid ledger endpoint {endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(PublishError::Rejected(format!(
                "ledger endpoint {endpoint} cannot carry a path"
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| PublishError::Rejected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base, http_client })
    }

    /// The credit id is pushed as a single percent-encoded segment.
    fn submission_url(&self, submission: &VerdictSubmission) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("verifications")
                .push(submission.credit_id.as_str());
        }
        url
    }
}

#[async_trait]
impl VerdictPublisher for HttpLedgerPublisher {
    async fn submit(&self, submission: &VerdictSubmission) -> Result<(), PublishError> {
        let url = self.submission_url(submission);
        let response = self
            .http_client
            .put(url)
            .json(submission)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Transient(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    PublishError::Transient(format!("connection failed: {e}"))
                } else {
                    PublishError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(PublishError::Transient(format!("HTTP status {status}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(PublishError::Rejected(format!("HTTP status {status}: {body}")))
        }
    }
}
