//! Verification coordinator: one wave per credit, published exactly once.
//!
//! The coordinator is the single writer of every credit's
//! [`VerificationState`]. A request either starts a wave, joins the wave
//! already in flight, or is skipped because the credit is resolved:
//!
//! ```text
//!            request                 all outcomes in, aggregated, published
//! Unverified ───────► Pending ─────────────────────────────────► Verified / Rejected
//!     ▲                  │  │                                          │
//!     │      cancel      │  │ publish retries exhausted                │ forced request
//!     └──────────────────┘  └──────────► PublishFailed ── request ──►  ▼
//!                                                                   Pending
//! ```
//!
//! A wave runs on its own task, so a requester that goes away never strands a
//! credit in `Pending`. A supervisor task awaits the wave and, should it
//! panic, puts the credit back to `Unverified` and wakes the waiters with
//! [`VerificationError::WaveLost`]. Every requester attached to a wave, the
//! starter and any joiners, observes the same result through a `watch` channel.
//!
//! The table keeps at most `max_tracked` credits. A new credit arriving at
//! the limit evicts the settled credit requested least recently; credits
//! with a wave in flight are never evicted.

use crate::aggregator::ResultAggregator;
use crate::error::VerificationError;

use carbon_publisher::RetryingPublisher;
use carbon_registry::{RegistryClient, RegistrySet};
use carbon_types::{
    CreditId, FailureReason, QueryOutcome, RequestMode, ScoringPolicy, SentinelTag,
    SourceOutcome, Timestamp, Verdict, VerificationRequest, VerificationState,
};
use carbon_utils::StatsCounter;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::Instrument;

/// Slack on top of the slowest client's timeout before the wave gives up on
/// a query task that ignores its own bound.
const WAVE_GRACE: Duration = Duration::from_millis(50);

/// Default bound on the number of credits held in memory.
pub const DEFAULT_MAX_TRACKED: usize = 100_000;

// Counter names.
pub const WAVES_STARTED: &str = "waves_started";
pub const REQUESTS_JOINED: &str = "requests_joined";
pub const REQUESTS_SKIPPED: &str = "requests_skipped";
pub const VERDICTS_PUBLISHED: &str = "verdicts_published";
pub const PUBLISH_FAILURES: &str = "publish_failures";
pub const AGGREGATION_FAILURES: &str = "aggregation_failures";
pub const WAVES_CANCELLED: &str = "waves_cancelled";
pub const INVARIANT_VIOLATIONS: &str = "invariant_violations";
pub const WAVES_LOST: &str = "waves_lost";
pub const CREDITS_EVICTED: &str = "credits_evicted";

const COUNTERS: &[&str] = &[
    WAVES_STARTED,
    REQUESTS_JOINED,
    REQUESTS_SKIPPED,
    VERDICTS_PUBLISHED,
    PUBLISH_FAILURES,
    AGGREGATION_FAILURES,
    WAVES_CANCELLED,
    INVARIANT_VIOLATIONS,
    WAVES_LOST,
    CREDITS_EVICTED,
];

/// What the coordinator did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The request started a new wave.
    Started,
    /// A wave was already in flight; the request waited for its result.
    Joined,
    /// The credit was already resolved and the request was not forced.
    AlreadyResolved,
}

/// Answer to [`VerificationCoordinator::request_verification`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestResult {
    pub request: VerificationRequest,
    pub disposition: Disposition,
    /// Ticket of the wave whose result this is, if a wave ran.
    pub wave_ticket: Option<u64>,
    pub state: VerificationState,
}

type WaveResult = Result<VerificationState, VerificationError>;
type WaveSignal = watch::Sender<Option<WaveResult>>;

struct ActiveWave {
    ticket: u64,
    done: Arc<WaveSignal>,
    abort: AbortHandle,
}

#[derive(Default)]
struct CreditEntry {
    state: VerificationState,
    /// Present exactly while `state` is `Pending`.
    wave: Option<ActiveWave>,
    /// Ticket of the latest request for this credit.
    touched: u64,
}

struct Inner {
    registries: RegistrySet,
    aggregator: ResultAggregator,
    publisher: RetryingPublisher,
    credits: Mutex<HashMap<CreditId, CreditEntry>>,
    next_ticket: AtomicU64,
    max_tracked: usize,
    stats: StatsCounter,
}

/// Orchestrates verification waves. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct VerificationCoordinator {
    inner: Arc<Inner>,
}

impl VerificationCoordinator {
    pub fn new(
        registries: RegistrySet,
        policy: ScoringPolicy,
        publisher: RetryingPublisher,
    ) -> Result<Self, VerificationError> {
        Self::with_capacity(registries, policy, publisher, DEFAULT_MAX_TRACKED)
    }

    /// Like [`new`](Self::new), holding at most `max_tracked` credits (minimum 1).
    pub fn with_capacity(
        registries: RegistrySet,
        policy: ScoringPolicy,
        publisher: RetryingPublisher,
        max_tracked: usize,
    ) -> Result<Self, VerificationError> {
        if registries.is_empty() {
            return Err(VerificationError::NoRegistries);
        }
        let max_tracked = max_tracked.max(1);
        tracing::info!(
            registries = ?registries.sources(),
            wave_deadline_ms = registries.max_timeout().as_millis() as u64,
            max_tracked,
            "verification coordinator ready"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                registries,
                aggregator: ResultAggregator::new(policy),
                publisher,
                credits: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                max_tracked,
                stats: StatsCounter::new(COUNTERS),
            }),
        })
    }

    /// Verify `credit` on behalf of `requester` and wait for the outcome.
    ///
    /// - `Pending`: joins the in-flight wave, forced or not.
    /// - `Verified` / `Rejected`: returns the stored state unless `mode` is
    ///   [`RequestMode::Force`], which starts a new wave.
    /// - `Unverified` / `PublishFailed`: starts a wave.
    ///
    /// Errors when the wave's verdict could not be published, the wave was
    /// cancelled or crashed, an invariant broke, or a new credit arrives
    /// while every tracked credit has a wave in flight.
    pub async fn request_verification(
        &self,
        credit: CreditId,
        requester: impl Into<String>,
        mode: RequestMode,
    ) -> Result<RequestResult, VerificationError> {
        let request = VerificationRequest {
            credit: credit.clone(),
            requester: requester.into(),
            ticket: self.inner.next_ticket.fetch_add(1, Ordering::SeqCst),
            received_at: Timestamp::now(),
            mode,
        };

        let (disposition, wave_ticket, mut done) = {
            let mut credits = self.inner.credits.lock().await;
            if !credits.contains_key(&credit) {
                self.make_room(&mut credits, &credit)?;
            }
            let entry = credits.entry(credit.clone()).or_default();
            entry.touched = request.ticket;

            let consistent = match (&entry.wave, entry.state.pending_ticket()) {
                (Some(wave), Some(ticket)) => wave.ticket == ticket,
                (None, None) => true,
                _ => false,
            };
            if !consistent {
                self.inner.stats.increment(INVARIANT_VIOLATIONS);
                let detail = format!(
                    "state {} does not match wave bookkeeping",
                    entry.state.name()
                );
                tracing::error!(%credit, %detail, "credit state corrupted");
                return Err(VerificationError::InvariantViolation { credit, detail });
            }

            if let Some(wave) = &entry.wave {
                self.inner.stats.increment(REQUESTS_JOINED);
                tracing::debug!(
                    %credit,
                    requester = %request.requester,
                    wave = wave.ticket,
                    "joining in-flight wave"
                );
                (Disposition::Joined, wave.ticket, wave.done.subscribe())
            } else if entry.state.is_resolved() && mode == RequestMode::Normal {
                self.inner.stats.increment(REQUESTS_SKIPPED);
                tracing::debug!(%credit, state = entry.state.name(), "credit already resolved, skipping");
                return Ok(RequestResult {
                    request,
                    disposition: Disposition::AlreadyResolved,
                    wave_ticket: None,
                    state: entry.state.clone(),
                });
            } else {
                let done = self.start_wave(entry, &request);
                (Disposition::Started, request.ticket, done)
            }
        };

        let result = match done.wait_for(Option::is_some).await {
            Ok(signal) => (*signal).clone(),
            Err(_) => None,
        };
        let state = result.unwrap_or_else(|| Err(VerificationError::WaveLost(credit)))?;

        Ok(RequestResult {
            request,
            disposition,
            wave_ticket: Some(wave_ticket),
            state,
        })
    }

    /// Evict the least recently requested settled credit if the table is full.
    ///
    /// `PublishFailed` credits go only after every other settled credit.
    fn make_room(
        &self,
        credits: &mut HashMap<CreditId, CreditEntry>,
        incoming: &CreditId,
    ) -> Result<(), VerificationError> {
        let limit = self.inner.max_tracked;
        if credits.len() < limit {
            return Ok(());
        }
        let victim = credits
            .iter()
            .filter(|(_, entry)| entry.wave.is_none())
            .min_by_key(|(_, entry)| {
                let failed = matches!(entry.state, VerificationState::PublishFailed { .. });
                (failed, entry.touched)
            })
            .map(|(credit, _)| credit.clone());
        let Some(victim) = victim else {
            tracing::warn!(credit = %incoming, limit, "every tracked credit is pending, refusing request");
            return Err(VerificationError::AtCapacity {
                credit: incoming.clone(),
                limit,
            });
        };
        if let Some(evicted) = credits.remove(&victim) {
            self.inner.stats.increment(CREDITS_EVICTED);
            tracing::debug!(credit = %victim, state = evicted.state.name(), "evicted credit to make room");
        }
        Ok(())
    }

    /// Move `entry` to `Pending` and launch the wave task. Caller holds the table lock.
    fn start_wave(
        &self,
        entry: &mut CreditEntry,
        request: &VerificationRequest,
    ) -> watch::Receiver<Option<WaveResult>> {
        let (tx, rx) = watch::channel(None);
        let done = Arc::new(tx);

        let previous = std::mem::replace(
            &mut entry.state,
            VerificationState::Pending {
                ticket: request.ticket,
                started_at: request.received_at,
            },
        );
        self.inner.stats.increment(WAVES_STARTED);
        tracing::info!(
            credit = %request.credit,
            requester = %request.requester,
            ticket = request.ticket,
            previous = previous.name(),
            forced = request.mode == RequestMode::Force,
            "verification wave started"
        );

        let span = tracing::info_span!("wave", credit = %request.credit, ticket = request.ticket);
        let body = tokio::spawn(
            run_wave(Arc::clone(&self.inner), request.credit.clone(), request.ticket)
                .instrument(span.clone()),
        );
        let abort = body.abort_handle();
        tokio::spawn(
            supervise_wave(
                Arc::clone(&self.inner),
                request.credit.clone(),
                request.ticket,
                body,
                Arc::clone(&done),
            )
            .instrument(span),
        );

        entry.wave = Some(ActiveWave {
            ticket: request.ticket,
            done,
            abort,
        });
        rx
    }

    /// Current state of `credit`; credits never seen are `Unverified`.
    pub async fn status(&self, credit: &CreditId) -> VerificationState {
        self.inner
            .credits
            .lock()
            .await
            .get(credit)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Abandon the in-flight wave for `credit`, if any.
    ///
    /// Outstanding registry queries are aborted, the credit goes back to
    /// `Unverified`, and everyone waiting on the wave gets
    /// [`VerificationError::Cancelled`]. A verdict the wave already handed to
    /// the ledger stays there until the next wave overwrites it.
    pub async fn cancel(&self, credit: &CreditId) -> bool {
        let mut credits = self.inner.credits.lock().await;
        let Some(entry) = credits.get_mut(credit) else {
            return false;
        };
        let Some(wave) = entry.wave.take() else {
            return false;
        };
        wave.abort.abort();
        entry.state = VerificationState::Unverified;
        finish(&wave.done, Err(VerificationError::Cancelled(credit.clone())));
        self.inner.stats.increment(WAVES_CANCELLED);
        tracing::info!(%credit, ticket = wave.ticket, "verification wave cancelled");
        true
    }

    /// Number of credits the coordinator has seen.
    pub async fn tracked(&self) -> usize {
        self.inner.credits.lock().await.len()
    }

    pub fn stats(&self) -> BTreeMap<&'static str, u64> {
        self.inner.stats.snapshot()
    }

    pub fn registries(&self) -> &RegistrySet {
        &self.inner.registries
    }
}

/// Publish `result` to the wave's waiters unless a result is already set.
fn finish(done: &WaveSignal, result: WaveResult) {
    done.send_if_modified(|slot| {
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        true
    });
}

/// One complete fan-out → aggregate → publish cycle.
async fn run_wave(inner: Arc<Inner>, credit: CreditId, ticket: u64) -> WaveResult {
    let outcomes = fan_out(&inner.registries, &credit).await;
    let result = settle(&inner, &credit, ticket, outcomes).await;
    if let Err(e) = &result {
        if matches!(e, VerificationError::InvariantViolation { .. }) {
            inner.stats.increment(INVARIANT_VIOLATIONS);
            tracing::error!(error = %e, "wave aborted");
        }
    }
    result
}

/// Deliver the wave's result, or release the credit if the wave panicked.
async fn supervise_wave(
    inner: Arc<Inner>,
    credit: CreditId,
    ticket: u64,
    body: JoinHandle<WaveResult>,
    done: Arc<WaveSignal>,
) {
    let result = match body.await {
        Ok(result) => result,
        // Only `cancel` aborts a wave, and it has already signalled.
        Err(e) if e.is_cancelled() => Err(VerificationError::Cancelled(credit)),
        Err(e) => {
            inner.stats.increment(WAVES_LOST);
            tracing::error!(error = %e, "wave task crashed, releasing credit");
            let mut credits = inner.credits.lock().await;
            if let Ok(entry) = owned_entry(&mut credits, &credit, ticket, "release") {
                entry.wave = None;
                entry.state = VerificationState::Unverified;
            }
            Err(VerificationError::WaveLost(credit))
        }
    };
    finish(&done, result);
}

async fn settle(
    inner: &Inner,
    credit: &CreditId,
    ticket: u64,
    outcomes: Vec<SourceOutcome>,
) -> WaveResult {
    if outcomes.len() != inner.registries.len() {
        return Err(VerificationError::InvariantViolation {
            credit: credit.clone(),
            detail: format!(
                "{} outcomes for {} registries",
                outcomes.len(),
                inner.registries.len()
            ),
        });
    }

    let verdict = match inner.aggregator.aggregate(&outcomes) {
        Ok(verdict) => verdict,
        Err(e) => {
            inner.stats.increment(AGGREGATION_FAILURES);
            tracing::error!(error = %e, "aggregation failed, rejecting credit");
            Verdict::sentinel(SentinelTag::AggregationFailed)
        }
    };
    tracing::info!(
        valid = verdict.valid,
        score = verdict.score,
        sources = ?verdict.source_names(),
        "verdict computed"
    );

    ensure_owner(inner, credit, ticket, "publish").await?;
    let published = inner.publisher.publish(credit, &verdict).await;

    let mut credits = inner.credits.lock().await;
    let entry = owned_entry(&mut credits, credit, ticket, "record verdict")?;
    entry.wave = None;

    match published {
        Ok(receipt) => {
            inner.stats.increment(VERDICTS_PUBLISHED);
            entry.state = VerificationState::resolved(verdict);
            tracing::info!(
                state = entry.state.name(),
                attempts = receipt.attempts,
                "verification wave complete"
            );
            Ok(entry.state.clone())
        }
        Err(failure) => {
            inner.stats.increment(PUBLISH_FAILURES);
            let reason = failure.last_error.to_string();
            entry.state = VerificationState::PublishFailed {
                verdict,
                attempts: failure.attempts,
                reason: reason.clone(),
            };
            tracing::error!(
                attempts = failure.attempts,
                %reason,
                "verdict could not be published; operator attention required"
            );
            Err(VerificationError::PublishFailed {
                credit: credit.clone(),
                attempts: failure.attempts,
                reason,
            })
        }
    }
}

async fn ensure_owner(
    inner: &Inner,
    credit: &CreditId,
    ticket: u64,
    step: &str,
) -> Result<(), VerificationError> {
    let mut credits = inner.credits.lock().await;
    owned_entry(&mut credits, credit, ticket, step).map(|_| ())
}

/// The credit's entry, provided it is still `Pending` under `ticket`.
fn owned_entry<'a>(
    credits: &'a mut HashMap<CreditId, CreditEntry>,
    credit: &CreditId,
    ticket: u64,
    step: &str,
) -> Result<&'a mut CreditEntry, VerificationError> {
    let violation = |detail: String| VerificationError::InvariantViolation {
        credit: credit.clone(),
        detail,
    };
    let entry = credits
        .get_mut(credit)
        .ok_or_else(|| violation(format!("credit vanished before {step}")))?;
    match entry.state.pending_ticket() {
        Some(t) if t == ticket => Ok(entry),
        _ => Err(violation(format!(
            "wave {ticket} tried to {step} while credit is {}",
            entry.state.name()
        ))),
    }
}

/// Aborts the query tasks still running when a wave is dropped or cancelled.
struct QueryTasks(Vec<JoinHandle<QueryOutcome>>);

impl Drop for QueryTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Query every registry concurrently, each under its own timeout.
///
/// Always returns one outcome per registry, in registration order: timeouts,
/// crashed tasks and stragglers past the wave deadline become `Failure`.
async fn fan_out(registries: &RegistrySet, credit: &CreditId) -> Vec<SourceOutcome> {
    let clients = registries.clients();
    let deadline = tokio::time::Instant::now() + registries.max_timeout() + WAVE_GRACE;

    let mut tasks = QueryTasks(Vec::with_capacity(clients.len()));
    for client in clients {
        let client = Arc::clone(client);
        let credit = credit.clone();
        tasks.0.push(tokio::spawn(async move { bounded_query(client, credit).await }));
    }

    let mut outcomes = Vec::with_capacity(clients.len());
    for (client, handle) in clients.iter().zip(tasks.0.iter_mut()) {
        let source = client.source();
        let outcome = match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(%source, error = %e, "registry query task failed");
                QueryOutcome::Failure(FailureReason::Aborted(e.to_string()))
            }
            Err(_) => QueryOutcome::Failure(FailureReason::Timeout {
                after_ms: client.timeout().as_millis() as u64,
            }),
        };
        tracing::debug!(%source, ?outcome, "registry settled");
        outcomes.push(SourceOutcome::new(source, outcome));
    }
    outcomes
}

async fn bounded_query(client: Arc<dyn RegistryClient>, credit: CreditId) -> QueryOutcome {
    let bound = client.timeout();
    match tokio::time::timeout(bound, client.query(&credit)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                source = %client.source(),
                %credit,
                bound_ms = bound.as_millis() as u64,
                "registry query timed out"
            );
            QueryOutcome::Failure(FailureReason::Timeout {
                after_ms: bound.as_millis() as u64,
            })
        }
    }
}
