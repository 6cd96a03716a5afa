//! Scripted registry that answers from a table, counts its calls.

use async_trait::async_trait;
use carbon_registry::RegistryClient;
use carbon_types::{CreditId, FailureReason, QueryOutcome, RegistryRecord, RegistrySource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// A registry whose answers are set by the test.
///
/// Credits without a scripted answer get the default outcome (`NotFound`
/// unless changed). Queries can be delayed, or parked behind a gate until the
/// test calls [`open_gate`](ScriptedRegistry::open_gate).
pub struct ScriptedRegistry {
    source: RegistrySource,
    timeout: Duration,
    delay: Duration,
    panics: bool,
    default: QueryOutcome,
    answers: Mutex<HashMap<CreditId, QueryOutcome>>,
    calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl ScriptedRegistry {
    pub fn new(source: RegistrySource) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            source,
            timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
            panics: false,
            default: QueryOutcome::NotFound,
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            gate,
        }
    }

    /// Every credit exists with this quality.
    pub fn found(source: RegistrySource, quality: u32, retired: bool) -> Self {
        Self::new(source).with_default(success(source, quality, retired))
    }

    /// Every query fails as if the registry were down.
    pub fn down(source: RegistrySource) -> Self {
        Self::new(source).with_default(QueryOutcome::Failure(FailureReason::Unavailable(
            "connection refused".into(),
        )))
    }

    pub fn with_default(mut self, outcome: QueryOutcome) -> Self {
        self.default = outcome;
        self
    }

    pub fn with_answer(self, credit: CreditId, outcome: QueryOutcome) -> Self {
        self.set_answer(credit, outcome);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic inside `query`, simulating a crashed client.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Park every query until [`open_gate`](Self::open_gate).
    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn set_answer(&self, credit: CreditId, outcome: QueryOutcome) {
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(credit, outcome);
    }

    /// Number of queries received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Shorthand for a successful, existing record.
pub fn success(source: RegistrySource, quality: u32, retired: bool) -> QueryOutcome {
    match RegistryRecord::new(source, true, quality, retired) {
        Ok(record) => QueryOutcome::Success(record),
        Err(e) => QueryOutcome::Failure(FailureReason::Malformed(e.to_string())),
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    fn source(&self) -> RegistrySource {
        self.source
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn query(&self, credit: &CreditId) -> QueryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = gate.wait_for(|open| *open).await;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("scripted registry {} crashed", self.source);
        }

        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(credit)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
