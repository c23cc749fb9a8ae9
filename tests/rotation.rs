//! Rotation protocol tests against instrumented token stores

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use refresh_rotation::auth::{
    generate_renewal_token, validate_access_token, validate_renewal_token, RenewalService,
};
use refresh_rotation::clock::{Clock, FixedClock};
use refresh_rotation::configuration::JwtSettings;
use refresh_rotation::error::{RotationError, StoreError};
use refresh_rotation::store::{InMemoryTokenStore, NewRenewalToken, RenewalTokenRecord, TokenStore};

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret_access: "integration-access-secret-0123456789".to_string(),
        secret_renewal: "integration-renewal-secret-0123456789".to_string(),
        access_ttl: 600,
        renewal_ttl_days: 30,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 14, 0, 0).unwrap()
}

/// Counts every call and can be told to fail inserts
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryTokenStore,
    calls: AtomicUsize,
    fail_create: AtomicBool,
}

impl RecordingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for RecordingStore {
    async fn find_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        self.touch();
        self.inner.find_by_owner_and_token(owner_id, token_value).await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        self.touch();
        self.inner.delete_by_id(id).await
    }

    async fn take_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        self.touch();
        self.inner.take_by_owner_and_token(owner_id, token_value).await
    }

    async fn create(&self, token: NewRenewalToken) -> Result<RenewalTokenRecord, StoreError> {
        self.touch();
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }
        self.inner.create(token).await
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        self.touch();
        self.inner.delete_by_owner(owner_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.touch();
        self.inner.delete_expired(now).await
    }
}

struct TestHarness {
    service: Arc<RenewalService>,
    store: Arc<RecordingStore>,
    clock: Arc<FixedClock>,
}

fn harness() -> TestHarness {
    let store = Arc::new(RecordingStore::default());
    let clock = Arc::new(FixedClock::new(t0()));
    let service = Arc::new(RenewalService::new(
        store.clone(),
        clock.clone(),
        jwt_settings(),
    ));
    TestHarness {
        service,
        store,
        clock,
    }
}

#[tokio::test]
async fn rotated_token_cannot_be_used_twice() {
    let app = harness();
    let owner_id = Uuid::new_v4();
    let pair = app.service.issue(owner_id, "u1@example.com").await.unwrap();

    app.service.rotate(&pair.refresh_token).await.unwrap();
    let second = app.service.rotate(&pair.refresh_token).await;

    assert!(matches!(second, Err(RotationError::TokenNotFound)));
}

#[tokio::test]
async fn scenario_t1_t2_t3() {
    let app = harness();
    let u1 = Uuid::new_v4();
    let t1 = app.service.issue(u1, "u1@example.com").await.unwrap().refresh_token;

    let rotated = app.service.rotate(&t1).await.unwrap();
    let t2 = rotated.refresh_token;
    assert_ne!(t2, t1);
    let a1 = validate_access_token(&rotated.access_token, t0(), &jwt_settings()).unwrap();
    assert_eq!(a1.sub, u1.to_string());

    let records = app.store.inner.records_for(u1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].expires_at, t0() + Duration::days(30));

    assert!(matches!(
        app.service.rotate(&t1).await,
        Err(RotationError::TokenNotFound)
    ));

    let t3 = app.service.rotate(&t2).await.unwrap().refresh_token;
    assert_ne!(t3, t2);
}

#[tokio::test]
async fn foreign_secret_rejected_before_store_access() {
    let app = harness();
    let mut foreign = jwt_settings();
    foreign.secret_renewal = "attacker-controlled-secret-0123456789".to_string();
    let forged = generate_renewal_token(
        &Uuid::new_v4(),
        "victim@example.com",
        t0(),
        t0() + Duration::days(30),
        &foreign,
    )
    .unwrap();

    let result = app.service.rotate(&forged).await;

    assert!(matches!(result, Err(RotationError::InvalidSignature)));
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn altered_payload_rejected_before_store_access() {
    let app = harness();
    let pair = app.service.issue(Uuid::new_v4(), "u@example.com").await.unwrap();
    let calls_after_issue = app.store.calls();

    // Swap in the payload of a token minted for someone else
    let other = app.service.issue(Uuid::new_v4(), "x@example.com").await.unwrap();
    let calls_after_other = app.store.calls();
    let mine: Vec<&str> = pair.refresh_token.split('.').collect();
    let theirs: Vec<&str> = other.refresh_token.split('.').collect();
    let spliced = format!("{}.{}.{}", mine[0], theirs[1], mine[2]);

    let result = app.service.rotate(&spliced).await;

    assert!(matches!(result, Err(RotationError::InvalidSignature)));
    assert!(calls_after_other > calls_after_issue);
    assert_eq!(app.store.calls(), calls_after_other);
}

#[tokio::test]
async fn expired_token_rejected_without_consuming_record() {
    let app = harness();
    let owner_id = Uuid::new_v4();
    let pair = app.service.issue(owner_id, "u@example.com").await.unwrap();
    let calls = app.store.calls();

    app.clock.advance(Duration::days(31));
    let result = app.service.rotate(&pair.refresh_token).await;

    assert!(matches!(result, Err(RotationError::Expired)));
    assert_eq!(app.store.calls(), calls);
    assert_eq!(app.store.inner.records_for(owner_id).len(), 1);
}

#[tokio::test]
async fn failed_insert_surfaces_error_and_old_token_stays_consumed() {
    let app = harness();
    let owner_id = Uuid::new_v4();
    let pair = app.service.issue(owner_id, "u@example.com").await.unwrap();

    app.store.fail_create.store(true, Ordering::SeqCst);
    let result = app.service.rotate(&pair.refresh_token).await;
    assert!(matches!(
        result,
        Err(RotationError::Store(StoreError::Unavailable(_)))
    ));
    assert!(app.store.inner.records_for(owner_id).is_empty());

    app.store.fail_create.store(false, Ordering::SeqCst);
    let retry = app.service.rotate(&pair.refresh_token).await;
    assert!(matches!(retry, Err(RotationError::TokenNotFound)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotations_have_exactly_one_winner() {
    let app = harness();
    let owner_id = Uuid::new_v4();
    let pair = app.service.issue(owner_id, "race@example.com").await.unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let spawn_rotation = |token: String| {
        let service = app.service.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            service.rotate(&token).await
        })
    };

    let first = spawn_rotation(pair.refresh_token.clone());
    let second = spawn_rotation(pair.refresh_token.clone());
    let results = [first.await.unwrap(), second.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let not_found = results
        .iter()
        .filter(|r| matches!(r, Err(RotationError::TokenNotFound)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(not_found, 1);
    assert_eq!(app.store.inner.records_for(owner_id).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_rotations_never_fork_the_chain() {
    let app = harness();
    let owner_id = Uuid::new_v4();
    let pair = app.service.issue(owner_id, "race@example.com").await.unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = app.service.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { service.rotate(&token).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, RotationError::TokenNotFound)),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(app.store.inner.records_for(owner_id).len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The email and subject survive any number of rotations unchanged
    #[test]
    fn prop_claims_preserved(
        email in "[a-z]{1,12}@[a-z]{1,8}\\.(com|org|net)",
        rotations in 1usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = harness();
            let owner_id = Uuid::new_v4();
            let mut current = app.service.issue(owner_id, &email).await.unwrap();

            for _ in 0..rotations {
                app.clock.advance(Duration::hours(1));
                let next = app.service.rotate(&current.refresh_token).await.unwrap();
                prop_assert_ne!(&next.refresh_token, &current.refresh_token);
                current = next;
            }

            let now = app.clock.now();
            let renewal = validate_renewal_token(&current.refresh_token, now, &jwt_settings()).unwrap();
            let access = validate_access_token(&current.access_token, now, &jwt_settings()).unwrap();
            prop_assert_eq!(renewal.email, email.clone());
            prop_assert_eq!(&renewal.sub, &owner_id.to_string());
            prop_assert_eq!(&access.sub, &owner_id.to_string());
            Ok(())
        })?;
    }

    /// Flipping any single character of a valid token never yields a rotation
    #[test]
    fn prop_mutated_token_never_rotates(index in any::<prop::sample::Index>(), replacement in "[A-Za-z0-9_-]") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = harness();
            let owner_id = Uuid::new_v4();
            let pair = app.service.issue(owner_id, "mutate@example.com").await.unwrap();

            let mut chars: Vec<char> = pair.refresh_token.chars().collect();
            let i = index.index(chars.len());
            let new_char = replacement.chars().next().unwrap();
            prop_assume!(chars[i] != new_char && chars[i] != '.');
            chars[i] = new_char;
            let mutated: String = chars.into_iter().collect();

            let result = app.service.rotate(&mutated).await;
            prop_assert!(result.is_err());
            prop_assert_eq!(app.store.inner.records_for(owner_id).len(), 1);
            Ok(())
        })?;
    }
}
