//! The ordered set of registries a wave fans out to.

use crate::client::RegistryClient;
use crate::error::RegistryError;

use carbon_types::RegistrySource;
use std::sync::Arc;
use std::time::Duration;

/// Registered registry clients, in query order.
///
/// Each source may appear once, so corroboration counts independent
/// registries rather than duplicate endpoints.
#[derive(Clone, Default)]
pub struct RegistrySet {
    clients: Vec<Arc<dyn RegistryClient>>,
}

impl std::fmt::Debug for RegistrySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySet")
            .field("sources", &self.clients.iter().map(|c| c.source()).collect::<Vec<_>>())
            .finish()
    }
}

impl RegistrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Registration order is query order.
    pub fn register(&mut self, client: Arc<dyn RegistryClient>) -> Result<(), RegistryError> {
        let source = client.source();
        if self.get(source).is_some() {
            return Err(RegistryError::DuplicateSource(source.to_string()));
        }
        tracing::debug!(%source, timeout_ms = client.timeout().as_millis() as u64, "registry registered");
        self.clients.push(client);
        Ok(())
    }

    pub fn with(mut self, client: Arc<dyn RegistryClient>) -> Result<Self, RegistryError> {
        self.register(client)?;
        Ok(self)
    }

    pub fn get(&self, source: RegistrySource) -> Option<&Arc<dyn RegistryClient>> {
        self.clients.iter().find(|c| c.source() == source)
    }

    pub fn clients(&self) -> &[Arc<dyn RegistryClient>] {
        &self.clients
    }

    pub fn sources(&self) -> Vec<RegistrySource> {
        self.clients.iter().map(|c| c.source()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// The longest individual timeout: queries run in parallel, so this
    /// bounds a whole wave.
    pub fn max_timeout(&self) -> Duration {
        self.clients
            .iter()
            .map(|c| c.timeout())
            .max()
            .unwrap_or(Duration::ZERO)
    }
}
