//! HTTP client for registry record endpoints.

use crate::client::{RegistryClient, DEFAULT_QUERY_TIMEOUT};
use crate::error::RegistryError;
use crate::keys::KeyMapper;

use async_trait::async_trait;
use carbon_types::{
    CreditId, FailureReason, QueryOutcome, RecordMetadata, RegistryRecord, RegistrySource,
};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the registry API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Everything needed to reach one registry over HTTP.
#[derive(Clone, Debug)]
pub struct HttpRegistryConfig {
    pub source: RegistrySource,
    /// Base URL of the registry API.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub keys: KeyMapper,
}

impl HttpRegistryConfig {
    pub fn new(source: RegistrySource, endpoint: impl Into<String>) -> Self {
        Self {
            source,
            endpoint: endpoint.into(),
            api_key: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
            keys: KeyMapper::for_source(source),
        }
    }
}

/// Client for one registry's record API.
///
/// Sends `GET {endpoint}/credits/{key}` and parses the JSON record.
/// `404` means the registry does not know the key.
pub struct HttpRegistryClient {
    config: HttpRegistryConfig,
    base: Url,
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
}

/// Raw JSON record returned by a registry.
///
/// The API contract: `GET /credits/{key}` returns
/// `{"exists": bool, "quality": int, "retired": bool, "vintage"?, "project_type"?, "methodology"?}`.
#[derive(Debug, Deserialize)]
struct RecordResponse {
    exists: bool,
    quality: u32,
    #[serde(default)]
    retired: bool,
    #[serde(default)]
    vintage: Option<u16>,
    #[serde(default)]
    project_type: Option<String>,
    #[serde(default)]
    methodology: Option<String>,
}

impl RecordResponse {
    fn into_record(self, source: RegistrySource) -> Result<RegistryRecord, RegistryError> {
        let record = RegistryRecord::new(source, self.exists, self.quality, self.retired)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        Ok(record.with_metadata(RecordMetadata {
            vintage: self.vintage,
            project_type: self.project_type,
            methodology: self.methodology,
        }))
    }
}

impl HttpRegistryClient {
    pub fn new(config: HttpRegistryConfig) -> Result<Self, RegistryError> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| RegistryError::Other(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(RegistryError::Other(format!(
                "endpoint {} cannot carry a path",
                config.endpoint
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .map_err(|e| RegistryError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            base,
            http_client,
        })
    }

    /// `{endpoint}/credits/{key}` with `key` percent-encoded as one segment.
    fn record_url(&self, key: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("credits").push(key);
        }
        url
    }

    /// Fetch the record filed under `key`. `Ok(None)` means not found.
    pub async fn fetch(&self, key: &str) -> Result<Option<RegistryRecord>, RegistryError> {
        let url = self.record_url(key);
        let mut request = self.http_client.get(url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::SourceTimeout(self.config.timeout)
            } else if e.is_connect() {
                RegistryError::SourceUnavailable(format!("connection failed: {e}"))
            } else {
                RegistryError::SourceUnavailable(e.to_string())
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RegistryError::SourceUnavailable(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body: RecordResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::SourceTimeout(self.config.timeout)
            } else {
                RegistryError::InvalidResponse(format!("failed to parse registry record: {e}"))
            }
        })?;
        body.into_record(self.config.source).map(Some)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    fn source(&self) -> RegistrySource {
        self.config.source
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn query(&self, credit: &CreditId) -> QueryOutcome {
        let (key, mapped) = self.config.keys.resolve(credit);
        if !mapped {
            tracing::debug!(source = %self.config.source, %credit, %key, "credit not in key table, using derived key");
        }
        match self.fetch(&key).await {
            Ok(Some(record)) => QueryOutcome::Success(record),
            Ok(None) => QueryOutcome::NotFound,
            Err(e) => {
                tracing::warn!(source = %self.config.source, %credit, error = %e, "registry query failed");
                QueryOutcome::Failure(FailureReason::from(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, http::StatusCode, routing::get, Router};

    /// Serve a fake registry on an ephemeral port and return its base URL.
    async fn spawn_registry() -> String {
        async fn record(Path(key): Path<String>, headers: HeaderMap) -> (StatusCode, String) {
            match key.as_str() {
                "VCS-1" => (
                    StatusCode::OK,
                    r#"{"exists": true, "quality": 85, "retired": false, "vintage": 2021, "methodology": "VM0007"}"#.into(),
                ),
                "VCS-retired" => (
                    StatusCode::OK,
                    r#"{"exists": true, "quality": 60, "retired": true}"#.into(),
                ),
                "VCS-7?lot#2" => (StatusCode::OK, r#"{"exists": true, "quality": 42}"#.into()),
                "VCS-garbage" => (StatusCode::OK, "not json".into()),
                "VCS-toohigh" => (StatusCode::OK, r#"{"exists": true, "quality": 250}"#.into()),
                "VCS-down" => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
                "VCS-secret" => {
                    if headers.get(API_KEY_HEADER).is_some_and(|v| v == "k1") {
                        (StatusCode::OK, r#"{"exists": true, "quality": 10}"#.into())
                    } else {
                        (StatusCode::UNAUTHORIZED, String::new())
                    }
                }
                "VCS-slow" => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    (StatusCode::OK, r#"{"exists": true, "quality": 1}"#.into())
                }
                _ => (StatusCode::NOT_FOUND, String::new()),
            }
        }
        let app = Router::new().route("/credits/:key", get(record));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(endpoint: &str) -> HttpRegistryClient {
        let mut config = HttpRegistryConfig::new(RegistrySource::Verra, endpoint);
        config.keys = KeyMapper::for_source(RegistrySource::Verra)
            .with_entry(CreditId::from(1), "VCS-1");
        config.timeout = Duration::from_millis(500);
        HttpRegistryClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn mapped_credit_returns_record() {
        let url = spawn_registry().await;
        let outcome = client(&url).query(&CreditId::from(1)).await;
        let QueryOutcome::Success(record) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(record.exists);
        assert_eq!(record.quality, 85);
        assert_eq!(record.source, RegistrySource::Verra);
        assert_eq!(record.metadata.vintage, Some(2021));
        assert_eq!(record.metadata.methodology.as_deref(), Some("VM0007"));
    }

    #[tokio::test]
    async fn unmapped_credit_uses_derived_key() {
        let url = spawn_registry().await;
        let credit: CreditId = "retired".parse().unwrap();
        let outcome = client(&url).query(&credit).await;
        assert!(matches!(outcome, QueryOutcome::Success(r) if r.retired));
    }

    #[tokio::test]
    async fn reserved_characters_stay_inside_the_key() {
        let url = spawn_registry().await;
        let c = client(&url);
        // Unescaped, these would fetch `VCS-1` and borrow credit 1's record.
        for raw in ["1?x", "1#x", "1%3Fx"] {
            let outcome = c.query(&raw.parse().unwrap()).await;
            assert_eq!(outcome, QueryOutcome::NotFound, "{raw}");
        }

        let outcome = c.query(&"7?lot#2".parse().unwrap()).await;
        assert!(matches!(outcome, QueryOutcome::Success(r) if r.quality == 42));
    }

    #[test]
    fn record_url_encodes_key_segment() {
        let c = client("http://registry.example/api/");
        assert_eq!(
            c.record_url("VCS-1?x#y").as_str(),
            "http://registry.example/api/credits/VCS-1%3Fx%23y"
        );
    }

    #[test]
    fn invalid_endpoint_is_refused() {
        let config = HttpRegistryConfig::new(RegistrySource::Verra, "not a url");
        assert!(matches!(
            HttpRegistryClient::new(config),
            Err(RegistryError::Other(_))
        ));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let url = spawn_registry().await;
        let outcome = client(&url).query(&CreditId::from(999)).await;
        assert_eq!(outcome, QueryOutcome::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let url = spawn_registry().await;
        let outcome = client(&url).query(&"down".parse().unwrap()).await;
        assert!(matches!(
            outcome,
            QueryOutcome::Failure(FailureReason::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn unparseable_or_out_of_range_body_is_malformed() {
        let url = spawn_registry().await;
        let c = client(&url);
        for credit in ["garbage", "toohigh"] {
            let outcome = c.query(&credit.parse().unwrap()).await;
            assert!(
                matches!(outcome, QueryOutcome::Failure(FailureReason::Malformed(_))),
                "{credit}: {outcome:?}"
            );
        }
    }

    #[tokio::test]
    async fn api_key_header_is_sent() {
        let url = spawn_registry().await;
        let mut config = HttpRegistryConfig::new(RegistrySource::Verra, &url);
        config.api_key = Some("k1".into());
        let c = HttpRegistryClient::new(config).unwrap();
        let outcome = c.query(&"secret".parse().unwrap()).await;
        assert!(outcome.is_success());

        let without_key = client(&url).query(&"secret".parse().unwrap()).await;
        assert!(matches!(without_key, QueryOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn slow_registry_times_out() {
        let url = spawn_registry().await;
        let outcome = client(&url).query(&"slow".parse().unwrap()).await;
        assert_eq!(
            outcome,
            QueryOutcome::Failure(FailureReason::Timeout { after_ms: 500 })
        );
    }

    #[tokio::test]
    async fn unreachable_registry_is_failure() {
        // Port 9 (discard) on localhost is almost never listening.
        let outcome = client("http://127.0.0.1:9").query(&CreditId::from(1)).await;
        assert!(matches!(outcome, QueryOutcome::Failure(_)));
    }

    #[test]
    fn record_response_deserialization() {
        let json = r#"{"exists": true, "quality": 70}"#;
        let resp: RecordResponse = serde_json::from_str(json).unwrap();
        assert!(resp.exists);
        assert!(!resp.retired);
        assert_eq!(resp.vintage, None);
    }
}
