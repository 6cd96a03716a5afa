//! The fixed set of registries a credit can be verified against.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An external carbon registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    /// Verra (Verified Carbon Standard).
    Verra,
    /// Gold Standard.
    GoldStandard,
    /// Climate Action Reserve.
    ClimateActionReserve,
}

impl RegistrySource {
    pub const ALL: [RegistrySource; 3] = [
        RegistrySource::Verra,
        RegistrySource::GoldStandard,
        RegistrySource::ClimateActionReserve,
    ];

    /// Stable name used in logs, configs and downstream submissions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verra => "verra",
            Self::GoldStandard => "gold_standard",
            Self::ClimateActionReserve => "climate_action_reserve",
        }
    }

    /// Prefix of the registry's own serial numbers, used to derive a key
    /// for credits missing from the lookup table.
    pub fn default_key_prefix(&self) -> &'static str {
        match self {
            Self::Verra => "VCS",
            Self::GoldStandard => "GS",
            Self::ClimateActionReserve => "CAR",
        }
    }
}

impl fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrySource {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypesError::UnknownSource(s.to_string()))
    }
}
