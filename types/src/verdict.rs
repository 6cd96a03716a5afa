//! The aggregated trust decision for one credit.

use crate::source::RegistrySource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stand-in for the source list when no registry contributed evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelTag {
    /// No registry answered at all; every query failed or timed out.
    Unreachable,
    /// Registries answered but none confirmed the credit exists.
    NoEvidence,
    /// The aggregator itself failed.
    AggregationFailed,
}

impl SentinelTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "sentinel:unreachable",
            Self::NoEvidence => "sentinel:no_evidence",
            Self::AggregationFailed => "sentinel:aggregation_failed",
        }
    }
}

impl fmt::Display for SentinelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which registries a verdict rests on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VerdictSources {
    /// Registries that answered with a record, in query order.
    Contributors(Vec<RegistrySource>),
    Sentinel(SentinelTag),
}

/// Validity, quality score and contributing sources for one credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    /// Final quality score, 0–100.
    pub score: u8,
    pub sources: VerdictSources,
}

impl Verdict {
    /// An invalid, zero-score verdict carrying a sentinel source tag.
    pub fn sentinel(tag: SentinelTag) -> Self {
        Self {
            valid: false,
            score: 0,
            sources: VerdictSources::Sentinel(tag),
        }
    }

    /// Source names as handed to the downstream ledger.
    pub fn source_names(&self) -> Vec<String> {
        match &self.sources {
            VerdictSources::Contributors(sources) => {
                sources.iter().map(|s| s.as_str().to_string()).collect()
            }
            VerdictSources::Sentinel(tag) => vec![tag.as_str().to_string()],
        }
    }

    pub fn sentinel_tag(&self) -> Option<SentinelTag> {
        match self.sources {
            VerdictSources::Sentinel(tag) => Some(tag),
            VerdictSources::Contributors(_) => None,
        }
    }
}
