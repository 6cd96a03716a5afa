use std::sync::Arc;
use std::time::Duration;

use carbon_nullables::registry::success;
use carbon_nullables::{NullLedger, ScriptedRegistry};
use carbon_publisher::{RetryPolicy, RetryingPublisher};
use carbon_registry::RegistrySet;
use carbon_types::{
    CreditId, RegistrySource, RequestMode, ScoringPolicy, VerificationState,
};
use carbon_verification::coordinator::{
    REQUESTS_JOINED, VERDICTS_PUBLISHED, WAVES_LOST, WAVES_STARTED,
};
use carbon_verification::{
    Disposition, RequestResult, VerificationCoordinator, VerificationError,
};

struct Harness {
    coordinator: VerificationCoordinator,
    registries: Vec<Arc<ScriptedRegistry>>,
    ledger: Arc<NullLedger>,
}

impl Harness {
    fn new(registries: Vec<ScriptedRegistry>, ledger: NullLedger, retry: RetryPolicy) -> Self {
        let registries: Vec<Arc<ScriptedRegistry>> = registries.into_iter().map(Arc::new).collect();
        let ledger = Arc::new(ledger);
        let mut set = RegistrySet::new();
        for r in &registries {
            set.register(r.clone()).unwrap();
        }
        let coordinator = VerificationCoordinator::new(
            set,
            ScoringPolicy::default(),
            RetryingPublisher::new(ledger.clone(), retry),
        )
        .unwrap();
        Self {
            coordinator,
            registries,
            ledger,
        }
    }

    fn gated_trio() -> Self {
        Self::new(
            vec![
                ScriptedRegistry::found(RegistrySource::Verra, 85, false).gated(),
                ScriptedRegistry::found(RegistrySource::GoldStandard, 70, false).gated(),
                ScriptedRegistry::found(RegistrySource::ClimateActionReserve, 78, false).gated(),
            ],
            NullLedger::new(),
            RetryPolicy::none(),
        )
    }

    fn open_gates(&self) {
        for r in &self.registries {
            r.open_gate();
        }
    }

    fn calls(&self) -> Vec<usize> {
        self.registries.iter().map(|r| r.calls()).collect()
    }

    fn request(
        &self,
        credit: u64,
        requester: &str,
        mode: RequestMode,
    ) -> tokio::task::JoinHandle<Result<RequestResult, VerificationError>> {
        let coordinator = self.coordinator.clone();
        let requester = requester.to_string();
        tokio::spawn(async move {
            coordinator
                .request_verification(CreditId::from(credit), requester, mode)
                .await
        })
    }

    async fn until(&self, mut done: impl FnMut(&Self) -> bool) {
        while !done(self) {
            tokio::task::yield_now().await;
        }
    }
}

#[tokio::test]
async fn concurrent_requests_share_one_wave() {
    let h = Harness::gated_trio();

    let first = h.request(1, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1, 1, 1]).await;

    let joiners: Vec<_> = (0..9)
        .map(|i| h.request(1, &format!("buyer-{i}"), RequestMode::Normal))
        .collect();
    h.until(|h| h.coordinator.stats()[REQUESTS_JOINED] == 9).await;
    h.open_gates();

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.disposition, Disposition::Started);
    for joiner in joiners {
        let joined = joiner.await.unwrap().unwrap();
        assert_eq!(joined.disposition, Disposition::Joined);
        assert_eq!(joined.wave_ticket, first.wave_ticket);
        assert_eq!(joined.state, first.state);
    }

    // Exactly one call per registry and one publication for the whole wave.
    assert_eq!(h.calls(), vec![1, 1, 1]);
    assert_eq!(h.ledger.calls(), 1);
    let stats = h.coordinator.stats();
    assert_eq!(stats[WAVES_STARTED], 1);
    assert_eq!(stats[VERDICTS_PUBLISHED], 1);
}

#[tokio::test]
async fn forced_request_joins_a_pending_wave() {
    let h = Harness::gated_trio();

    let first = h.request(2, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1, 1, 1]).await;
    let forced = h.request(2, "operator", RequestMode::Force);
    h.until(|h| h.coordinator.stats()[REQUESTS_JOINED] == 1).await;
    h.open_gates();

    assert_eq!(first.await.unwrap().unwrap().disposition, Disposition::Started);
    assert_eq!(forced.await.unwrap().unwrap().disposition, Disposition::Joined);
    assert_eq!(h.calls(), vec![1, 1, 1]);
}

#[tokio::test]
async fn distinct_credits_run_independent_waves() {
    let h = Harness::gated_trio();

    let a = h.request(10, "alice", RequestMode::Normal);
    let b = h.request(11, "bob", RequestMode::Normal);
    h.until(|h| h.calls() == vec![2, 2, 2]).await;
    h.open_gates();

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!(a.disposition, Disposition::Started);
    assert_eq!(b.disposition, Disposition::Started);
    assert_ne!(a.wave_ticket, b.wave_ticket);
    assert_eq!(h.ledger.len(), 2);
}

#[tokio::test]
async fn dropped_requester_does_not_strand_the_credit() {
    let h = Harness::gated_trio();
    let credit = CreditId::from(3);

    let abandoned = h.request(3, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1, 1, 1]).await;
    abandoned.abort();
    let _ = abandoned.await;

    assert!(h.coordinator.status(&credit).await.is_pending());
    h.open_gates();
    h.until(|h| h.ledger.accepted() == 1).await;

    let mut state = h.coordinator.status(&credit).await;
    while state.is_pending() {
        tokio::task::yield_now().await;
        state = h.coordinator.status(&credit).await;
    }
    assert!(matches!(state, VerificationState::Verified { .. }));
}

#[tokio::test(start_paused = true)]
async fn transient_publish_faults_are_retried() {
    let h = Harness::new(
        vec![
            ScriptedRegistry::found(RegistrySource::Verra, 60, false),
            ScriptedRegistry::found(RegistrySource::GoldStandard, 60, false),
        ],
        NullLedger::failing(3),
        RetryPolicy::default(),
    );

    let result = h
        .coordinator
        .request_verification(CreditId::from(4), "alice", RequestMode::Normal)
        .await
        .unwrap();

    assert!(matches!(result.state, VerificationState::Verified { .. }));
    assert_eq!(h.ledger.calls(), 4);
    assert_eq!(h.ledger.accepted(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_publish_fails_every_waiter() {
    let h = Harness::new(
        vec![ScriptedRegistry::found(RegistrySource::Verra, 60, false).gated()],
        NullLedger::failing(u32::MAX),
        RetryPolicy::default().with_max_attempts(3),
    );

    let first = h.request(5, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1]).await;
    let joiner = h.request(5, "bob", RequestMode::Normal);
    h.until(|h| h.coordinator.stats()[REQUESTS_JOINED] == 1).await;
    h.open_gates();

    for handle in [first, joiner] {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, VerificationError::PublishFailed { attempts: 3, .. }));
    }
    let state = h.coordinator.status(&CreditId::from(5)).await;
    let VerificationState::PublishFailed { verdict, attempts, .. } = state else {
        panic!("expected publish failure, got {state:?}");
    };
    assert_eq!(attempts, 3);
    assert_eq!(verdict.score, 50);
}

#[tokio::test]
async fn republishing_the_same_verdict_is_idempotent() {
    let h = Harness::new(
        vec![
            ScriptedRegistry::found(RegistrySource::Verra, 85, false),
            ScriptedRegistry::found(RegistrySource::GoldStandard, 70, false),
        ],
        NullLedger::new(),
        RetryPolicy::none(),
    );
    let credit = CreditId::from(6);

    h.coordinator
        .request_verification(credit.clone(), "alice", RequestMode::Normal)
        .await
        .unwrap();
    let once = h.ledger.get(&credit).unwrap();

    h.coordinator
        .request_verification(credit.clone(), "operator", RequestMode::Force)
        .await
        .unwrap();
    assert_eq!(h.ledger.get(&credit), Some(once));
    assert_eq!(h.ledger.len(), 1);
}

#[tokio::test]
async fn not_found_everywhere_is_rejected() {
    let h = Harness::new(
        vec![
            ScriptedRegistry::new(RegistrySource::Verra),
            ScriptedRegistry::down(RegistrySource::GoldStandard),
            ScriptedRegistry::new(RegistrySource::ClimateActionReserve).with_answer(
                CreditId::from(8),
                success(RegistrySource::ClimateActionReserve, 90, false),
            ),
        ],
        NullLedger::new(),
        RetryPolicy::none(),
    );

    let result = h
        .coordinator
        .request_verification(CreditId::from(7), "alice", RequestMode::Normal)
        .await
        .unwrap();
    let VerificationState::Rejected { verdict } = result.state else {
        panic!("expected rejection");
    };
    assert_eq!(verdict.score, 0);
    assert_eq!(verdict.source_names(), vec!["sentinel:no_evidence".to_string()]);

    let published = h.ledger.get(&CreditId::from(7)).unwrap();
    assert!(!published.is_valid);
    assert_eq!(published.quality_score, 0);
}

#[tokio::test(start_paused = true)]
async fn hung_registry_cannot_block_the_wave() {
    let h = Harness::new(
        vec![
            ScriptedRegistry::found(RegistrySource::Verra, 70, false),
            ScriptedRegistry::found(RegistrySource::GoldStandard, 70, false)
                .gated()
                .with_timeout(Duration::from_secs(1)),
        ],
        NullLedger::new(),
        RetryPolicy::none(),
    );

    let result = h
        .coordinator
        .request_verification(CreditId::from(9), "alice", RequestMode::Normal)
        .await
        .unwrap();
    let verdict = result.state.verdict().unwrap();
    assert_eq!(verdict.score, 60);
    assert!(verdict.valid);
}

#[tokio::test]
async fn new_request_after_cancel_starts_over() {
    let h = Harness::gated_trio();
    let credit = CreditId::from(12);

    let first = h.request(12, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1, 1, 1]).await;
    assert!(h.coordinator.cancel(&credit).await);
    assert_eq!(
        first.await.unwrap().unwrap_err(),
        VerificationError::Cancelled(credit.clone())
    );

    h.open_gates();
    let second = h
        .coordinator
        .request_verification(credit.clone(), "alice", RequestMode::Normal)
        .await
        .unwrap();
    assert_eq!(second.disposition, Disposition::Started);
    assert_eq!(h.calls(), vec![2, 2, 2]);
    assert_eq!(h.ledger.accepted(), 1);
}

#[tokio::test]
async fn crashed_wave_releases_the_credit_and_its_waiters() {
    let h = Harness::new(
        vec![
            ScriptedRegistry::found(RegistrySource::Verra, 85, false).gated(),
            ScriptedRegistry::found(RegistrySource::GoldStandard, 70, false).gated(),
        ],
        NullLedger::panicking(),
        RetryPolicy::none(),
    );

    let starter = h.request(40, "alice", RequestMode::Normal);
    h.until(|h| h.calls() == vec![1, 1]).await;
    let joiner = h.request(40, "bob", RequestMode::Normal);
    h.until(|h| h.coordinator.stats()[REQUESTS_JOINED] == 1).await;
    h.open_gates();

    let lost = VerificationError::WaveLost(CreditId::from(40));
    for waiter in [starter, joiner] {
        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter hung on a crashed wave")
            .unwrap();
        assert_eq!(result.unwrap_err(), lost);
    }
    assert_eq!(
        h.coordinator.status(&CreditId::from(40)).await,
        VerificationState::Unverified
    );

    // A later request is not stuck behind the dead wave either.
    let again = tokio::time::timeout(
        Duration::from_secs(2),
        h.coordinator
            .request_verification(CreditId::from(40), "carol", RequestMode::Normal),
    )
    .await
    .expect("request after a crashed wave hung");
    assert_eq!(again.unwrap_err(), lost);
    assert_eq!(h.coordinator.stats()[WAVES_LOST], 2);

    h.ledger.set_panicking(false);
    let recovered = h
        .coordinator
        .request_verification(CreditId::from(40), "carol", RequestMode::Normal)
        .await
        .unwrap();
    assert_eq!(recovered.disposition, Disposition::Started);
    assert!(matches!(recovered.state, VerificationState::Verified { .. }));
    assert!(h.ledger.get(&CreditId::from(40)).is_some());
}
