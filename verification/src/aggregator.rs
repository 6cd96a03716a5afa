//! Result aggregation. Turns per-registry outcomes into one verdict.
//!
//! Scoring, in order:
//! 1. Keep `Success` outcomes whose record says the credit exists.
//! 2. None left → invalid, score 0, sentinel source tag.
//! 3. Score = mean quality of the existing records, rounded to nearest
//!    (ties round down), in integer arithmetic.
//! 4. Any existing record retired → retired penalty, and the credit is invalid.
//! 5. Fewer confirmations than `min_corroboration` → corroboration penalty.
//! 6. Valid iff not retired and score ≥ `min_valid_score`.
//!
//! The function is pure: same outcomes and policy, same verdict.

use crate::error::AggregationError;
use carbon_types::outcome::MAX_QUALITY;
use carbon_types::{
    QueryOutcome, RegistryRecord, RegistrySource, ScoringPolicy, SentinelTag, SourceOutcome,
    Verdict, VerdictSources,
};

/// Stateless scorer parameterised by a [`ScoringPolicy`].
#[derive(Clone, Debug, Default)]
pub struct ResultAggregator {
    policy: ScoringPolicy,
}

impl ResultAggregator {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Compute the verdict for one complete set of outcomes.
    ///
    /// `outcomes` must hold one entry per queried registry, in query order.
    pub fn aggregate(&self, outcomes: &[SourceOutcome]) -> Result<Verdict, AggregationError> {
        validate(outcomes)?;

        let contributors: Vec<RegistrySource> = outcomes
            .iter()
            .filter(|o| o.outcome.is_success())
            .map(|o| o.source)
            .collect();

        let existing: Vec<&RegistryRecord> = outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                QueryOutcome::Success(record) if record.exists => Some(record),
                _ => None,
            })
            .collect();

        if existing.is_empty() {
            let tag = if outcomes.iter().any(|o| o.outcome.is_answer()) {
                SentinelTag::NoEvidence
            } else {
                SentinelTag::Unreachable
            };
            return Ok(Verdict::sentinel(tag));
        }

        let sum: u32 = existing.iter().map(|r| u32::from(r.quality)).sum();
        let mut score = rounded_mean(sum, existing.len() as u32);

        let retired = existing.iter().any(|r| r.retired);
        if retired {
            score = score.saturating_sub(u32::from(self.policy.retired_penalty));
        }
        if existing.len() < self.policy.min_corroboration {
            score = score.saturating_sub(u32::from(self.policy.low_corroboration_penalty));
        }

        let score = score.min(u32::from(MAX_QUALITY)) as u8;
        Ok(Verdict {
            valid: !retired && score >= self.policy.min_valid_score,
            score,
            sources: VerdictSources::Contributors(contributors),
        })
    }
}

fn validate(outcomes: &[SourceOutcome]) -> Result<(), AggregationError> {
    if outcomes.is_empty() {
        return Err(AggregationError::Empty);
    }
    let mut seen = Vec::with_capacity(outcomes.len());
    for o in outcomes {
        if seen.contains(&o.source) {
            return Err(AggregationError::DuplicateSource(o.source));
        }
        seen.push(o.source);
        if let QueryOutcome::Success(record) = &o.outcome {
            if record.quality > MAX_QUALITY {
                return Err(AggregationError::QualityOutOfRange {
                    registry: o.source,
                    quality: record.quality,
                });
            }
        }
    }
    Ok(())
}

/// `sum / count` rounded to nearest, ties towards zero. `count` is non-zero.
fn rounded_mean(sum: u32, count: u32) -> u32 {
    (2 * sum + count - 1) / (2 * count)
}
