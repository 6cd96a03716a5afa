//! Credit → registry serial number translation.

use carbon_types::{CreditId, RegistrySource};
use std::collections::HashMap;

/// Maps credits to the key a registry files them under.
///
/// Credits absent from the table get `<PREFIX>-<credit>` so they stay
/// queryable; the registry then decides whether that key exists.
#[derive(Clone, Debug)]
pub struct KeyMapper {
    prefix: String,
    table: HashMap<CreditId, String>,
}

impl KeyMapper {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            table: HashMap::new(),
        }
    }

    /// A mapper using the registry's usual serial prefix.
    pub fn for_source(source: RegistrySource) -> Self {
        Self::new(source.default_key_prefix())
    }

    pub fn with_entry(mut self, credit: CreditId, key: impl Into<String>) -> Self {
        self.insert(credit, key);
        self
    }

    pub fn insert(&mut self, credit: CreditId, key: impl Into<String>) {
        self.table.insert(credit, key.into());
    }

    /// The registry key for `credit`, and whether it came from the table.
    pub fn resolve(&self, credit: &CreditId) -> (String, bool) {
        match self.table.get(credit) {
            Some(key) => (key.clone(), true),
            None => (format!("{}-{}", self.prefix, credit), false),
        }
    }

    pub fn key_for(&self, credit: &CreditId) -> String {
        self.resolve(credit).0
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
