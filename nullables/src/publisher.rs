//! Recording ledger that stores the latest submission per credit.

use async_trait::async_trait;
use carbon_publisher::{PublishError, VerdictPublisher, VerdictSubmission};
use carbon_types::CreditId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory stand-in for the downstream ledger.
///
/// Storage is keyed by credit and overwritten on every accepted submission,
/// like the real ledger. The first `fail_next` submissions fail transiently;
/// with `reject_all` every submission is refused. A panicking ledger
/// crashes the submitting task, for exercising supervision.
#[derive(Default)]
pub struct NullLedger {
    entries: Mutex<HashMap<CreditId, VerdictSubmission>>,
    calls: AtomicUsize,
    accepted: AtomicUsize,
    fail_next: AtomicU32,
    reject_all: bool,
    panicking: AtomicBool,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` submissions with a transient error.
    pub fn failing(n: u32) -> Self {
        let ledger = Self::default();
        ledger.fail_next.store(n, Ordering::SeqCst);
        ledger
    }

    /// Refuse every submission permanently.
    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    /// Panic inside every submission until [`set_panicking`](Self::set_panicking) clears it.
    pub fn panicking() -> Self {
        let ledger = Self::default();
        ledger.set_panicking(true);
        ledger
    }

    pub fn set_panicking(&self, on: bool) {
        self.panicking.store(on, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Submission attempts received, accepted or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Submissions that were stored.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn get(&self, credit: &CreditId) -> Option<VerdictSubmission> {
        self.lock().get(credit).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CreditId, VerdictSubmission>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VerdictPublisher for NullLedger {
    async fn submit(&self, submission: &VerdictSubmission) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panicking.load(Ordering::SeqCst) {
            panic!("null ledger scripted to panic on {}", submission.credit_id);
        }
        if self.reject_all {
            return Err(PublishError::Rejected("ledger refuses all submissions".into()));
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Transient("ledger unavailable".into()));
        }
        self.lock()
            .insert(submission.credit_id.clone(), submission.clone());
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
