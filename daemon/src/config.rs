//! Daemon configuration with TOML file support.
//!
//! ```toml
//! rpc_port = 7080
//! log_format = "json"
//! max_tracked_credits = 100000
//!
//! [scoring]
//! min_valid_score = 40
//!
//! [publish]
//! ledger_endpoint = "https://ledger.example/api"
//! retry = { max_attempts = 5, initial_backoff_ms = 200 }
//!
//! [[registries]]
//! source = "verra"
//! endpoint = "https://registry.verra.example/api"
//! api_key = "..."
//! keys = { "42" = "VCS-1234" }
//!
//! [[registries]]
//! source = "gold_standard"
//! kind = "static"
//! records = { "GS-42" = { quality = 70 } }
//! ```

use carbon_publisher::{
    HttpLedgerPublisher, LogPublisher, RetryPolicy, RetryingPublisher, VerdictPublisher,
};
use carbon_registry::{
    HttpRegistryClient, HttpRegistryConfig, KeyMapper, RegistryClient, RegistrySet,
    StaticRegistryClient,
};
use carbon_types::{CreditId, RecordMetadata, RegistryRecord, RegistrySource, ScoringPolicy};
use carbon_utils::LogFormat;
use carbon_verification::{VerificationCoordinator, DEFAULT_MAX_TRACKED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("registry {registry}: {reason}")]
    Registry { registry: String, reason: String },

    #[error("publisher: {0}")]
    Publisher(String),

    #[error("no registries configured")]
    NoRegistries,
}

/// Configuration for the verification daemon.
///
/// Loaded from TOML via [`DaemonConfig::from_toml_file`] or built in code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default)]
    pub log_format: LogFormat,

    /// "trace", "debug", "info", "warn" or "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Credits held in memory before settled ones are evicted.
    #[serde(default = "default_max_tracked_credits")]
    pub max_tracked_credits: usize,

    #[serde(default)]
    pub scoring: ScoringPolicy,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub registries: Vec<RegistryConfig>,
}

/// Where verdicts go. Without a ledger endpoint they are only logged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub ledger_endpoint: Option<String>,

    /// Per-attempt timeout for ledger submissions.
    #[serde(default = "default_publish_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Http,
    Static,
}

/// One `[[registries]]` entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub source: RegistrySource,

    #[serde(default)]
    pub kind: RegistryKind,

    /// Base URL; required for `http` registries.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Prefix for derived keys; defaults to the registry's serial prefix.
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Credit id → registry key.
    #[serde(default)]
    pub keys: BTreeMap<String, String>,

    /// Registry key → record, for `static` registries.
    #[serde(default)]
    pub records: BTreeMap<String, StaticRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticRecord {
    #[serde(default = "default_true")]
    pub exists: bool,
    pub quality: u32,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub vintage: Option<u16>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub methodology: Option<String>,
}

fn default_rpc_port() -> u16 {
    7080
}

fn default_log_level() -> String {
    "info".into()
}

fn default_max_tracked_credits() -> usize {
    DEFAULT_MAX_TRACKED
}

fn default_publish_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl DaemonConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Instantiate every configured registry client.
    pub fn build_registries(&self) -> Result<RegistrySet, ConfigError> {
        if self.registries.is_empty() {
            return Err(ConfigError::NoRegistries);
        }
        let mut set = RegistrySet::new();
        for entry in &self.registries {
            let client = entry.build()?;
            set.register(client).map_err(|e| entry.error(e))?;
        }
        Ok(set)
    }

    pub fn build_publisher(&self) -> Result<RetryingPublisher, ConfigError> {
        let inner: Arc<dyn VerdictPublisher> = match &self.publish.ledger_endpoint {
            Some(endpoint) => Arc::new(
                HttpLedgerPublisher::with_timeout(
                    endpoint.clone(),
                    Duration::from_millis(self.publish.timeout_ms),
                )
                .map_err(|e| ConfigError::Publisher(e.to_string()))?,
            ),
            None => {
                tracing::warn!("no ledger endpoint configured, verdicts will only be logged");
                Arc::new(LogPublisher)
            }
        };
        Ok(RetryingPublisher::new(inner, self.publish.retry.clone()))
    }

    pub fn build_coordinator(&self) -> Result<VerificationCoordinator, ConfigError> {
        VerificationCoordinator::with_capacity(
            self.build_registries()?,
            self.scoring.clone(),
            self.build_publisher()?,
            self.max_tracked_credits,
        )
        .map_err(|_| ConfigError::NoRegistries)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rpc_port: default_rpc_port(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            max_tracked_credits: default_max_tracked_credits(),
            scoring: ScoringPolicy::default(),
            publish: PublishConfig::default(),
            registries: Vec::new(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ledger_endpoint: None,
            timeout_ms: default_publish_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RegistryConfig {
    fn error(&self, reason: impl ToString) -> ConfigError {
        ConfigError::Registry {
            registry: self.source.to_string(),
            reason: reason.to_string(),
        }
    }

    fn key_mapper(&self) -> Result<KeyMapper, ConfigError> {
        let mut keys = match &self.key_prefix {
            Some(prefix) => KeyMapper::new(prefix.clone()),
            None => KeyMapper::for_source(self.source),
        };
        for (credit, key) in &self.keys {
            let credit = CreditId::new(credit.as_str()).map_err(|e| self.error(e))?;
            keys.insert(credit, key.clone());
        }
        Ok(keys)
    }

    fn build(&self) -> Result<Arc<dyn RegistryClient>, ConfigError> {
        let keys = self.key_mapper()?;
        match self.kind {
            RegistryKind::Http => {
                let endpoint = self
                    .endpoint
                    .clone()
                    .ok_or_else(|| self.error("http registry needs an endpoint"))?;
                let mut config = HttpRegistryConfig::new(self.source, endpoint);
                config.api_key = self.api_key.clone();
                config.keys = keys;
                if let Some(ms) = self.timeout_ms {
                    config.timeout = Duration::from_millis(ms);
                }
                let client = HttpRegistryClient::new(config).map_err(|e| self.error(e))?;
                Ok(Arc::new(client))
            }
            RegistryKind::Static => {
                let mut client = StaticRegistryClient::new(self.source, keys);
                for (key, r) in &self.records {
                    let record = RegistryRecord::new(self.source, r.exists, r.quality, r.retired)
                        .map_err(|e| self.error(format!("record {key}: {e}")))?
                        .with_metadata(RecordMetadata {
                            vintage: r.vintage,
                            project_type: r.project_type.clone(),
                            methodology: r.methodology.clone(),
                        });
                    client.insert(key.clone(), record);
                }
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        rpc_port = 9000
        log_format = "json"
        max_tracked_credits = 500

        [scoring]
        min_valid_score = 50

        [publish]
        retry = { max_attempts = 2 }

        [[registries]]
        source = "verra"
        endpoint = "http://127.0.0.1:1"
        keys = { "42" = "VCS-1234" }

        [[registries]]
        source = "gold_standard"
        kind = "static"
        records = { "GS-42" = { quality = 70, vintage = 2020 } }
    "#;

    #[test]
    fn sample_parses() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.rpc_port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_tracked_credits, 500);
        assert_eq!(config.scoring.min_valid_score, 50);
        assert_eq!(config.scoring.min_corroboration, 2);
        assert_eq!(config.publish.retry.max_attempts, 2);
        assert_eq!(config.publish.retry.initial_backoff_ms, 200);
        assert_eq!(config.registries.len(), 2);
        assert_eq!(config.registries[0].kind, RegistryKind::Http);
        assert_eq!(config.registries[1].kind, RegistryKind::Static);
        assert!(config.registries[1].records["GS-42"].exists);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config.rpc_port, 7080);
        assert_eq!(config.publish.timeout_ms, 10_000);
        assert_eq!(config.max_tracked_credits, DEFAULT_MAX_TRACKED);
        assert!(config.publish.ledger_endpoint.is_none());
        assert_eq!(config.scoring, ScoringPolicy::default());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        let back = DaemonConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.rpc_port, config.rpc_port);
        assert_eq!(back.registries.len(), 2);
    }

    #[test]
    fn unknown_source_is_parse_error() {
        let err = DaemonConfig::from_toml_str("[[registries]]\nsource = \"acme\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builds_registries_in_order() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        let set = config.build_registries().unwrap();
        assert_eq!(
            set.sources(),
            vec![RegistrySource::Verra, RegistrySource::GoldStandard]
        );
    }

    #[tokio::test]
    async fn static_registry_serves_configured_records() {
        let config = DaemonConfig::from_toml_str(SAMPLE).unwrap();
        let set = config.build_registries().unwrap();
        let gs = set.get(RegistrySource::GoldStandard).unwrap();
        let outcome = gs.query(&CreditId::from(42)).await;
        assert!(matches!(
            outcome,
            carbon_types::QueryOutcome::Success(r) if r.quality == 70 && r.metadata.vintage == Some(2020)
        ));
    }

    #[test]
    fn http_registry_without_endpoint_is_refused() {
        let config =
            DaemonConfig::from_toml_str("[[registries]]\nsource = \"verra\"").unwrap();
        let err = config.build_registries().unwrap_err();
        assert!(matches!(err, ConfigError::Registry { .. }));
    }

    #[test]
    fn duplicate_registry_is_refused() {
        let toml = r#"
            [[registries]]
            source = "verra"
            kind = "static"
            [[registries]]
            source = "verra"
            kind = "static"
        "#;
        let err = DaemonConfig::from_toml_str(toml)
            .unwrap()
            .build_registries()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Registry { .. }));
    }

    #[test]
    fn out_of_range_static_quality_is_refused() {
        let toml = r#"
            [[registries]]
            source = "verra"
            kind = "static"
            records = { "VCS-1" = { quality = 101 } }
        "#;
        let err = DaemonConfig::from_toml_str(toml)
            .unwrap()
            .build_registries()
            .unwrap_err();
        assert!(err.to_string().contains("VCS-1"));
    }

    #[test]
    fn malformed_ledger_endpoint_is_refused() {
        let config = DaemonConfig::from_toml_str(
            "[publish]\nledger_endpoint = \"ledger.example/api\"",
        )
        .unwrap();
        let err = config.build_publisher().err();
        assert!(matches!(err, Some(ConfigError::Publisher(_))));
    }

    #[test]
    fn no_registries_is_refused() {
        let err = DaemonConfig::default().build_coordinator().err();
        assert!(matches!(err, Some(ConfigError::NoRegistries)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = DaemonConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.rpc_port, 9000);
    }

    #[test]
    fn missing_file_returns_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaemonConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
