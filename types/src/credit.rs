//! Credit identifier type.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier naming a credit under verification.
///
/// Ledgers name credits either by integer token id or by a string handle; both
/// are held in canonical string form so that `42` and `"42"` are the same key.
/// The identifier ends up in registry and ledger URLs, so it must be non-empty
/// and free of whitespace and `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CreditId(String);

impl CreditId {
    /// Create a credit identifier, rejecting values that cannot be used as a key.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let trimmed = s.trim();
        if trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(TypesError::InvalidCreditId(s));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric token id, if this credit is named by one.
    pub fn as_token_id(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for CreditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for CreditId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl FromStr for CreditId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CreditId {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CreditId> for String {
    fn from(id: CreditId) -> Self {
        id.0
    }
}
