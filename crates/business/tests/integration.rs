//! Service-level behaviour over the in-memory collaborators

use britewallet_business::{
    ErrorKind, ProvisionStatus, ProvisioningService, ProvisioningWorker, RecapitalizationService,
    ServiceContext, SummaryService, WalletConfig, WithdrawalService,
};
use britewallet_core::{
    ClubPack, FixedClock, Movement, MovementType, PremiumAggregate, SemesterId, Task, TaskEnvelope,
    User, UserRole, WpMovement,
};
use britewallet_persistence::{MemoryTaskQueue, MemoryWalletStore, WalletStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryWalletStore>,
    queue: Arc<MemoryTaskQueue>,
    ctx: ServiceContext,
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// First monthly window of 2022_1 is open
const FIRST_MONTH: &str = "2023-07-20T10:00:00Z";

async fn harness(now: &str) -> Harness {
    let store = Arc::new(MemoryWalletStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());
    let clock = Arc::new(FixedClock::new(at(now)));
    let config = WalletConfig {
        retry_backoff_ms: 1,
        ..WalletConfig::default()
    };
    let ctx = ServiceContext::new(store.clone(), queue.clone(), clock, config);

    for user in [
        User::new("alice", "Alice", "Bianchi", ClubPack::Premium, at(now)).with_card("C-ALICE"),
        User::new("bob", "Bob", "Verdi", ClubPack::Premium, at(now)).with_card("C-BOB"),
        User::new("carl", "Carl", "Neri", ClubPack::Basic, at(now)),
        User::new("admin", "Ada", "Admin", ClubPack::Premium, at(now))
            .with_card("C-ADMIN")
            .with_roles(vec![UserRole::Admin]),
    ] {
        store.insert_user(&user).await.unwrap();
    }

    Harness { store, queue, ctx }
}

async fn provisioned(h: &Harness, user_id: &str, semester: &str) -> Vec<WpMovement> {
    let outcome = ProvisioningService::new(&h.ctx)
        .provision(user_id, semester, dec!(1000))
        .await
        .unwrap();
    assert_eq!(outcome.status, ProvisionStatus::Ok);
    h.store
        .wp_movements_for_semester(user_id, SemesterId::parse(semester).unwrap())
        .await
        .unwrap()
}

async fn user(h: &Harness, id: &str) -> User {
    h.store.find_user(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_provisioning_is_idempotent() {
    let h = harness(FIRST_MONTH).await;
    let service = ProvisioningService::new(&h.ctx);

    let first = service.provision("alice", "2022_1", dec!(1000)).await.unwrap();
    assert_eq!(first.status, ProvisionStatus::Ok);
    assert_eq!(first.movement_ids.len(), 25);

    let second = service.provision("alice", "2022_1", dec!(1000)).await.unwrap();
    assert_eq!(second.status, ProvisionStatus::AlreadyExists);

    let mut a = first.movement_ids.clone();
    let mut b = second.movement_ids.clone();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(h.store.wp_movement_count().unwrap(), 25);

    // One new-semester notification for the one real provisioning
    assert_eq!(h.queue.tasks("notifications").len(), 1);

    let records = h
        .store
        .wp_movements_for_semester("alice", SemesterId::parse("2022_1").unwrap())
        .await
        .unwrap();
    let income = records[1].income().unwrap();
    assert_eq!(income.income_amount, dec!(40));
    assert_eq!(income.withdrawal_remaining, dec!(40));
    assert_eq!(income.withdrawable_from, at("2023-07-16T00:00:00Z"));
}

#[tokio::test]
async fn test_provisioning_rejections() {
    let h = harness(FIRST_MONTH).await;
    let service = ProvisioningService::new(&h.ctx);

    let nothing = service.provision("alice", "2022_1", dec!(10)).await.unwrap();
    assert_eq!(nothing.status, ProvisionStatus::NothingToAdd);
    assert!(nothing.movement_ids.is_empty());
    assert_eq!(h.store.wp_movement_count().unwrap(), 0);

    let err = service.provision("carl", "2022_1", dec!(1000)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = service.provision("ghost", "2022_1", dec!(1000)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.provision("alice", "2022-1", dec!(1000)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
}

#[tokio::test]
async fn test_notification_failure_keeps_provisioning() {
    let h = harness(FIRST_MONTH).await;
    h.queue.fail_queue("notifications");

    let outcome = ProvisioningService::new(&h.ctx)
        .provision("alice", "2022_1", dec!(1000))
        .await
        .unwrap();
    assert_eq!(outcome.status, ProvisionStatus::Ok);
    assert_eq!(h.store.wp_movement_count().unwrap(), 25);
}

#[tokio::test]
async fn test_withdrawal_decrements_remaining() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    let service = WithdrawalService::new(&h.ctx);

    let updated = service.withdraw(records[1].clone(), dec!(15), &alice, None).await.unwrap();
    let income = updated.income().unwrap();
    assert_eq!(income.withdrawal_remaining, dec!(25));
    assert!(income.withdrawal_date.is_none());
    assert_eq!(income.withdrawal_movements.len(), 1);
    assert_eq!(updated.version, 1);

    let ledger = h.store.movements_for_user("alice").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].movement_type, MovementType::DepositUnlockedWp);
    assert_eq!(ledger[0].amount_change, dec!(15));
    assert_eq!(ledger[0].created_by.as_deref(), Some("alice"));

    let err = service.withdraw(updated.clone(), dec!(30), &alice, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountExceeded);

    let emptied = service.withdraw(updated, dec!(25), &alice, None).await.unwrap();
    let income = emptied.income().unwrap();
    assert_eq!(income.withdrawal_remaining, dec!(0));
    assert!(income.withdrawal_date.is_some());
    assert_eq!(income.withdrawal_movements.len(), 2);

    // Rejected attempts leave no ledger entries behind
    assert_eq!(h.store.movements_for_user("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_withdrawal_from_stale_copy_reloads() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    let service = WithdrawalService::new(&h.ctx);

    service.withdraw(records[1].clone(), dec!(10), &alice, None).await.unwrap();
    let updated = service.withdraw(records[1].clone(), dec!(10), &alice, None).await.unwrap();

    assert_eq!(updated.income().unwrap().withdrawal_remaining, dec!(20));
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn test_concurrent_withdrawals_on_one_record() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    let service = WithdrawalService::new(&h.ctx);

    let (first, second) = tokio::join!(
        service.withdraw(records[1].clone(), dec!(30), &alice, None),
        service.withdraw(records[1].clone(), dec!(30), &alice, None),
    );

    let (ok, err) = match (first, second) {
        (Ok(updated), Err(e)) | (Err(e), Ok(updated)) => (updated, e),
        (first, second) => panic!("expected one success and one rejection, got {:?} and {:?}", first, second),
    };
    assert_eq!(err.kind(), ErrorKind::AmountExceeded);
    assert_eq!(ok.income().unwrap().withdrawal_remaining, dec!(10));

    let stored = h.store.find_wp_movement(&records[1].id).await.unwrap().unwrap();
    assert_eq!(stored.income().unwrap().withdrawal_remaining, dec!(10));
    assert_eq!(stored.income().unwrap().withdrawal_movements.len(), 1);
    assert_eq!(h.store.movements_for_user("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_withdrawal_timing_and_kind() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    let service = WithdrawalService::new(&h.ctx);

    // Second month has not opened yet
    let err = service.withdraw(records[2].clone(), dec!(5), &alice, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWithdrawable);

    let err = service.withdraw(records[0].clone(), dec!(5), &alice, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWithdrawable);

    let err = service.withdraw(records[1].clone(), dec!(0), &alice, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    assert_eq!(h.store.movement_count().unwrap(), 0);
}

#[tokio::test]
async fn test_withdrawal_authorization() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let bob = user(&h, "bob").await;
    let admin = user(&h, "admin").await;
    let service = WithdrawalService::new(&h.ctx);

    let err = service.withdraw(records[1].clone(), dec!(5), &bob, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Ownership is checked before the amount
    let err = service.withdraw(records[1].clone(), dec!(0), &bob, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = service.withdraw(records[1].clone(), dec!(-5), &bob, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // An admin unlocking from someone else's record credits the admin
    let updated = service.withdraw(records[1].clone(), dec!(5), &admin, None).await.unwrap();
    assert_eq!(updated.income().unwrap().withdrawal_remaining, dec!(35));
    assert_eq!(h.store.movements_for_user("admin").await.unwrap().len(), 1);

    let err = service
        .withdraw_by_id("missing", dec!(5), "alice", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_transfer_to_card() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    let service = WithdrawalService::new(&h.ctx);

    let err = service
        .withdraw(records[1].clone(), dec!(5), &alice, Some("C-ALICE"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = service
        .withdraw(records[1].clone(), dec!(5), &alice, Some("C-NOBODY"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let updated = service
        .withdraw_by_id(&records[1].id, dec!(12), "alice", Some("C-BOB"))
        .await
        .unwrap();

    let received = h.store.movements_for_user("bob").await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].movement_type, MovementType::DepositReceivedWp);
    assert_eq!(received[0].amount_change, dec!(12));
    assert_eq!(
        received[0].notes.as_deref(),
        Some("Wallet Premium - transfer from Alice Bianchi (C-ALICE)")
    );

    let recorded = &updated.income().unwrap().withdrawal_movements[0];
    assert_eq!(recorded.id, received[0].id);
    assert_eq!(
        recorded.notes.as_deref(),
        Some("Wallet Premium - transfer to Bob Verdi (C-BOB)")
    );
    assert!(h.store.movements_for_user("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_update_deletes_ledger_entry() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    h.store.set_fail_wp_updates(true);

    let err = WithdrawalService::new(&h.ctx)
        .withdraw(records[1].clone(), dec!(10), &alice, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(h.store.movement_count().unwrap(), 0);

    let stored = h.store.find_wp_movement(&records[1].id).await.unwrap().unwrap();
    assert_eq!(stored.income().unwrap().withdrawal_remaining, dec!(40));
}

#[tokio::test]
async fn test_withdraw_by_semester() {
    let h = harness(FIRST_MONTH).await;
    provisioned(&h, "alice", "2022_1").await;
    provisioned(&h, "alice", "2021_2").await;
    let alice = user(&h, "alice").await;
    let admin = user(&h, "admin").await;
    let service = WithdrawalService::new(&h.ctx);
    let both = vec!["2022_1".to_string(), "2021_2".to_string()];

    let err = service
        .withdraw_by_semester(&alice, None, &both, dec!(50), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountExceeded);

    let err = service
        .withdraw_by_semester(&admin, None, &both, dec!(80), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = service
        .withdraw_by_semester(&alice, None, &["2022-1".to_string()], dec!(5), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);

    let updated = service
        .withdraw_by_semester(&admin, Some("alice"), &both, dec!(80), None)
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated
        .iter()
        .all(|m| m.income().unwrap().withdrawal_remaining == Decimal::ZERO));

    let err = service
        .withdraw_by_semester(&alice, None, &["2022_1".to_string()], dec!(5), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWithdrawable);

    // The Wallet Premium of 2020_1 closed on 2023-07-15
    let err = service
        .withdraw_by_semester(&alice, None, &["2020_1".to_string()], dec!(5), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWithdrawable);
}

#[tokio::test]
async fn test_summaries() {
    let h = harness(FIRST_MONTH).await;
    let records = provisioned(&h, "alice", "2022_1").await;
    let alice = user(&h, "alice").await;
    WithdrawalService::new(&h.ctx)
        .withdraw(records[1].clone(), dec!(15), &alice, None)
        .await
        .unwrap();
    let service = SummaryService::new(&h.ctx);

    let summary = service.get_semester_summary("2022_1", "alice", true).await.unwrap();
    assert_eq!(summary.initial_amount, dec!(1000));
    assert_eq!(summary.earned, dec!(40));
    assert_eq!(summary.withdrawn, dec!(15));
    assert_eq!(summary.withdrawable, dec!(25));
    assert_eq!(summary.no_more_withdrawable, dec!(25));
    assert_eq!(summary.remaining_to_withdraw, dec!(25) + dec!(40) * dec!(23));
    assert_eq!(summary.movements.as_ref().map(Vec::len), Some(25));

    let empty = service.get_semester_summary("2022_1", "bob", false).await.unwrap();
    assert_eq!(empty.initial_amount, dec!(0));
    assert!(empty.movements.is_none());

    let all = service.get_user_summary("alice").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].semester_details.id, SemesterId::parse("2022_1").unwrap());
    assert!(all[0].movements.is_none());

    let err = service.find_wp_movement("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_end_semester_switch_and_worker() {
    let h = harness(FIRST_MONTH).await;
    let semester = SemesterId::parse("2022_1").unwrap();
    let created = at("2022-09-01T10:00:00Z");
    for movement in [
        Movement::new("alice", dec!(1000), MovementType::DepositAdded, semester, ClubPack::Premium, created),
        Movement::new("alice", dec!(200), MovementType::DepositUsed, semester, ClubPack::Premium, created),
        Movement::new("bob", dec!(20), MovementType::DepositAdded, semester, ClubPack::Premium, created),
        Movement::new("bob", dec!(30), MovementType::DepositUsed, semester, ClubPack::Premium, created),
    ] {
        h.store.insert_movement(&movement.unwrap()).await.unwrap();
    }
    let service = RecapitalizationService::new(&h.ctx);

    let err = service.trigger_end_semester_switch("2023_1", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let report = service.trigger_last_expired_switch().await.unwrap();
    assert_eq!(report.semester, semester);
    assert_eq!(report.count, 1);
    assert_eq!(report.users, vec!["alice".to_string()]);
    assert_eq!(report.expired_at, at("2023-06-30T23:59:59.999Z"));

    let tasks = h.queue.take("wallet-premium");
    assert_eq!(tasks.len(), 1);

    let report = ProvisioningWorker::new(&h.ctx).drain(tasks).await;
    assert_eq!(report.provisioned.len(), 1);
    assert_eq!(report.provisioned[0].status, ProvisionStatus::Ok);
    assert!(report.failed.is_empty());

    let records = h.store.wp_movements_for_semester("alice", semester).await.unwrap();
    assert_eq!(records[0].initial_amount, dec!(800));
    assert_eq!(records[1].income().unwrap().income_amount, dec!(32));

    // Nobody left with a positive balance once restricted to bob
    let only_bob = ["bob".to_string()].into_iter().collect();
    let err = service
        .trigger_end_semester_switch("2022_1", Some(&only_bob))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_worker_does_not_retry_rejections() {
    let h = harness(FIRST_MONTH).await;
    let semester = SemesterId::parse("2022_1").unwrap();
    let aggregate = |user: &str| PremiumAggregate {
        user_id: user.to_string(),
        in_amount: dec!(500),
        out_amount: dec!(0),
        remaining_amount: dec!(500),
        semester,
    };
    let envelopes = vec![
        TaskEnvelope::new(Task::AddBritesToPremiumWallet(aggregate("ghost")), "wallet-premium", Utc::now()),
        TaskEnvelope::new(Task::AddBritesToPremiumWallet(aggregate("bob")), "wallet-premium", Utc::now()),
        TaskEnvelope::new(Task::AddBritesToPremiumWallet(aggregate("bob")), "wallet-premium", Utc::now()),
    ];
    let ghost_id = envelopes[0].id.clone();

    let report = ProvisioningWorker::new(&h.ctx).drain(envelopes).await;
    assert_eq!(report.failed, vec![ghost_id]);
    assert!(report.requeued.is_empty());
    assert_eq!(report.provisioned.len(), 2);
    assert_eq!(report.provisioned[0].status, ProvisionStatus::Ok);
    assert_eq!(report.provisioned[1].status, ProvisionStatus::AlreadyExists);
}

#[tokio::test]
async fn test_worker_requeues_after_storage_failures() {
    let h = harness(FIRST_MONTH).await;
    let semester = SemesterId::parse("2022_1").unwrap();
    let aggregate = PremiumAggregate {
        user_id: "bob".to_string(),
        in_amount: dec!(500),
        out_amount: dec!(0),
        remaining_amount: dec!(500),
        semester,
    };
    let envelope = TaskEnvelope::new(Task::AddBritesToPremiumWallet(aggregate.clone()), "wallet-premium", Utc::now());
    let task_id = envelope.id.clone();

    h.store.set_fail_wallet_batches(true);
    let report = ProvisioningWorker::new(&h.ctx).drain(vec![envelope]).await;
    assert_eq!(report.requeued, vec![task_id]);
    assert!(report.failed.is_empty());
    assert!(report.provisioned.is_empty());
    assert_eq!(h.store.wp_movement_count().unwrap(), 0);

    let pending = h.queue.take("wallet-premium");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].task, Task::AddBritesToPremiumWallet(aggregate));

    // Once the store recovers the requeued task goes through
    h.store.set_fail_wallet_batches(false);
    let report = ProvisioningWorker::new(&h.ctx).drain(pending).await;
    assert_eq!(report.provisioned.len(), 1);
    assert_eq!(report.provisioned[0].status, ProvisionStatus::Ok);
    assert_eq!(h.store.wp_movement_count().unwrap(), 25);
}

#[tokio::test]
async fn test_unlock_reminders() {
    let h = harness("2023-08-10T09:00:00Z").await;
    provisioned(&h, "alice", "2022_1").await;
    let service = RecapitalizationService::new(&h.ctx);
    h.queue.take("notifications");

    assert_eq!(service.pending_unlock_users().await.unwrap(), vec!["alice".to_string()]);

    let report = service
        .notify_before_recapitalization(&["alice".to_string(), "bob".to_string(), "ghost".to_string()])
        .await
        .unwrap();
    assert_eq!(report.success, vec!["alice".to_string()]);
    assert_eq!(report.failed, vec!["bob".to_string(), "ghost".to_string()]);

    let sent = h.queue.take("notifications");
    assert_eq!(sent.len(), 1);
    match &sent[0].task {
        Task::CreateNotification(notification) => {
            assert_eq!(notification.title, "WP - Brites to unlock for July");
            assert_eq!(notification.extra_data["remaining"], "40");
            assert_eq!(notification.extra_data["withdrawableUntil"], "15/08/2023 23:59");
        }
        other => panic!("unexpected task {}", other),
    }
}
