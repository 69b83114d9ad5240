//! End-to-end rotation lifecycle tests against file-backed storage.

use credkit_lib::{AccountId, Amount, Channel, CredkitError, PolicyConfig, RotationPolicy};
use credkit_rotations::testing::MockBillingGateway;
use credkit_rotations::{
    CredentialStore, FileAttemptJournal, FileCredentialStore, RotationService, StatusCache,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn standard_policy() -> PolicyConfig {
    PolicyConfig {
        default_policy: RotationPolicy::new(
            3,
            12,
            Amount::from_minor_units(1649),
            Amount::from_minor_units(34900),
        ),
        channel_policies: Default::default(),
    }
}

fn file_service(
    dir: &std::path::Path,
    gateway: Arc<MockBillingGateway>,
) -> (RotationService, Arc<FileCredentialStore>) {
    let store = Arc::new(FileCredentialStore::new(dir.to_path_buf()).unwrap());
    let journal = Arc::new(FileAttemptJournal::new(dir.to_path_buf()).unwrap());
    let service =
        RotationService::new(store.clone(), gateway, journal, standard_policy()).unwrap();
    (service, store)
}

#[tokio::test]
async fn free_rotation_within_the_free_tier() {
    // Scenario: two rotations in with a free threshold of three, the next
    // rotation stays free.
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_a");
    let channel = Channel::atlas();
    service.onboard(&account, &channel).await.unwrap();

    let mut record = store.load(&account, &channel).await.unwrap().unwrap();
    record.change_count = 2;
    store.save(&record).await.unwrap();

    let result = service
        .request_rotation(&account, &channel, "scenario-a")
        .await
        .unwrap();

    assert!(!result.was_charged);
    assert_eq!(result.change_count, 3);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn declined_charge_changes_nothing() {
    // Scenario: free tier exhausted, billing declines; counters and the
    // live code survive untouched.
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::with_balance(Amount::zero()));
    let (service, store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_b");
    let channel = Channel::atlas();
    service.onboard(&account, &channel).await.unwrap();

    let mut record = store.load(&account, &channel).await.unwrap().unwrap();
    record.change_count = 3;
    store.save(&record).await.unwrap();
    let before = store.load(&account, &channel).await.unwrap().unwrap();

    let err = service
        .request_rotation(&account, &channel, "scenario-b")
        .await
        .unwrap_err();
    assert!(matches!(err, CredkitError::PaymentFailed { .. }));

    let after = store.load(&account, &channel).await.unwrap().unwrap();
    assert_eq!(after.change_count, 3);
    assert_eq!(after.current_code, before.current_code);
    assert!(gateway.total_charged().is_zero());
}

#[tokio::test]
async fn final_paid_rotation_blocks_the_record() {
    // Scenario: counter at 11 with a cap of 12; the charge succeeds, the
    // code changes, and the record blocks.
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_c");
    let channel = Channel::ceres();
    service.onboard(&account, &channel).await.unwrap();

    let mut record = store.load(&account, &channel).await.unwrap().unwrap();
    record.change_count = 11;
    store.save(&record).await.unwrap();
    let old_code = record.current_code.clone();

    let result = service
        .request_rotation(&account, &channel, "scenario-c")
        .await
        .unwrap();

    assert_eq!(result.change_count, 12);
    assert!(result.is_blocked);
    assert_ne!(result.new_code, old_code);
    assert_eq!(gateway.total_charged(), Amount::from_minor_units(1649));
}

#[tokio::test]
async fn paid_recovery_unblocks_with_a_fresh_code() {
    // Scenario: blocked record, recovery fee 34900; recovery succeeds,
    // unblocks, and (by documented design) resets the free tier.
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_d");
    let channel = Channel::ceres();
    service.onboard(&account, &channel).await.unwrap();

    let mut record = store.load(&account, &channel).await.unwrap().unwrap();
    record.change_count = 12;
    record.is_blocked = true;
    store.save(&record).await.unwrap();
    let blocked_code = record.current_code.clone();

    let result = service
        .recover_access(&account, &channel, "scenario-d")
        .await
        .unwrap();

    assert!(!result.is_blocked);
    assert_eq!(result.change_count, 0);
    assert_ne!(result.new_code, blocked_code);
    assert_eq!(gateway.total_charged(), Amount::from_minor_units(34900));
}

#[tokio::test]
async fn full_lifecycle_walks_free_paid_blocked_recovered() {
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, _store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_life");
    let channel = Channel::atlas();
    service.onboard(&account, &channel).await.unwrap();

    // 3 free rotations, then 9 paid; the 12th blocks.
    for i in 0..12u32 {
        let result = service
            .request_rotation(&account, &channel, &format!("life-{}", i))
            .await
            .unwrap();
        assert_eq!(result.was_charged, i >= 3);
        assert_eq!(result.change_count, i + 1);
        assert_eq!(result.is_blocked, i == 11);
    }
    assert_eq!(gateway.total_charged(), Amount::from_minor_units(9 * 1649));

    // Blocked: rotation is rejected, recovery is required.
    let err = service
        .request_rotation(&account, &channel, "life-blocked")
        .await
        .unwrap_err();
    assert!(matches!(err, CredkitError::Blocked { .. }));

    let recovered = service
        .recover_access(&account, &channel, "life-recover")
        .await
        .unwrap();
    assert!(!recovered.is_blocked);
    assert_eq!(recovered.change_count, 0);

    // Fresh free tier after recovery.
    let rotation = service
        .request_rotation(&account, &channel, "life-after")
        .await
        .unwrap();
    assert!(!rotation.was_charged);
}

#[tokio::test]
async fn lost_response_resolves_on_retry_without_double_charge() {
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    gateway.drop_response_for_next(1);
    let (service, store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_retry");
    let channel = Channel::atlas();
    service.onboard(&account, &channel).await.unwrap();

    let mut record = store.load(&account, &channel).await.unwrap().unwrap();
    record.change_count = 6;
    store.save(&record).await.unwrap();

    let err = service
        .request_rotation(&account, &channel, "retry-1")
        .await
        .unwrap_err();
    assert!(matches!(err, CredkitError::PaymentUnknown { .. }));

    // The journal exposes the pending attempt for reconciliation.
    let cutoff = chrono::Utc::now() + chrono::Duration::seconds(1);
    let unresolved = service.unresolved_attempts(cutoff).await.unwrap();
    assert_eq!(unresolved.len(), 1);

    // Retry with the same request id: exactly one charge, rotation lands.
    let result = service
        .request_rotation(&account, &channel, "retry-1")
        .await
        .unwrap();
    assert_eq!(result.change_count, 7);
    assert_eq!(gateway.total_charged(), Amount::from_minor_units(1649));

    // And the attempt is no longer pending.
    let unresolved = service.unresolved_attempts(cutoff).await.unwrap();
    assert!(unresolved.is_empty());
}

#[tokio::test]
async fn channels_rotate_independently() {
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, _store) = file_service(dir.path(), gateway.clone());

    let account = AccountId::from("acct_multi");
    service.onboard(&account, &Channel::atlas()).await.unwrap();
    service.onboard(&account, &Channel::ceres()).await.unwrap();

    for i in 0..4 {
        service
            .request_rotation(&account, &Channel::atlas(), &format!("atlas-{}", i))
            .await
            .unwrap();
    }

    let atlas = service.get_status(&account, &Channel::atlas()).await.unwrap();
    let ceres = service.get_status(&account, &Channel::ceres()).await.unwrap();
    assert_eq!(atlas.change_count, 4);
    assert!(atlas.is_chargeable_next);
    assert_eq!(ceres.change_count, 0);
    assert!(!ceres.is_chargeable_next);

    let statuses = service.list_statuses(&account).await.unwrap();
    assert_eq!(statuses.len(), 2);
}

#[tokio::test]
async fn cache_serves_reads_and_invalidates_on_rotation() {
    let dir = tempdir().unwrap();
    let gateway = Arc::new(MockBillingGateway::unlimited());
    let (service, _store) = file_service(dir.path(), gateway.clone());
    let cache = StatusCache::new(Duration::from_secs(60));

    let account = AccountId::from("acct_cache");
    let channel = Channel::atlas();
    service.onboard(&account, &channel).await.unwrap();

    let first = cache.get_or_load(&service, &account, &channel).await.unwrap();
    assert_eq!(cache.len(), 1);

    service
        .request_rotation(&account, &channel, "cache-1")
        .await
        .unwrap();

    // Stale until the caller invalidates.
    let stale = cache.get_or_load(&service, &account, &channel).await.unwrap();
    assert_eq!(stale, first);

    cache.invalidate(&account, &channel);
    let fresh = cache.get_or_load(&service, &account, &channel).await.unwrap();
    assert_eq!(fresh.change_count, 1);
    assert_ne!(fresh.current_code, first.current_code);
}
