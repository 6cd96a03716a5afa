//! Registry client backed by a table configured at startup.

use crate::client::RegistryClient;
use crate::keys::KeyMapper;

use async_trait::async_trait;
use carbon_types::{CreditId, QueryOutcome, RegistryRecord, RegistrySource};
use std::collections::HashMap;
use std::time::Duration;

/// Static tables answer immediately; the bound only matters if the table is huge.
const STATIC_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Serves records from an in-memory table keyed by registry serial number.
///
/// Stands in for a registry during demos and staging, where records are
/// loaded from configuration instead of fetched.
pub struct StaticRegistryClient {
    source: RegistrySource,
    keys: KeyMapper,
    records: HashMap<String, RegistryRecord>,
}

impl StaticRegistryClient {
    pub fn new(source: RegistrySource, keys: KeyMapper) -> Self {
        Self {
            source,
            keys,
            records: HashMap::new(),
        }
    }

    /// File a record under a registry key. The record's source is forced to
    /// this client's source.
    pub fn insert(&mut self, key: impl Into<String>, mut record: RegistryRecord) {
        record.source = self.source;
        self.records.insert(key.into(), record);
    }

    pub fn with_record(mut self, key: impl Into<String>, record: RegistryRecord) -> Self {
        self.insert(key, record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RegistryClient for StaticRegistryClient {
    fn source(&self) -> RegistrySource {
        self.source
    }

    fn timeout(&self) -> Duration {
        STATIC_QUERY_TIMEOUT
    }

    async fn query(&self, credit: &CreditId) -> QueryOutcome {
        let key = self.keys.key_for(credit);
        match self.records.get(&key) {
            Some(record) => QueryOutcome::Success(record.clone()),
            None => QueryOutcome::NotFound,
        }
    }
}
