//! SQLite-backed WalletStore behaviour

use britewallet_core::{
    ClubPack, Movement, MovementType, SemesterId, SemesterWindow, User, UserRole, WpMovement,
};
use britewallet_persistence::{init_database, SqliteWalletStore, WalletStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

async fn memory_store() -> SqliteWalletStore {
    let pool = init_database("sqlite::memory:").await.unwrap();
    SqliteWalletStore::new(pool)
}

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn entry(user: &str, amount: Decimal, kind: MovementType, pack: ClubPack) -> Movement {
    Movement::new(user, amount, kind, SemesterId::parse("2023_1").unwrap(), pack, at("2023-09-01T10:00:00Z")).unwrap()
}

fn wallet(user_id: &str, semester: &str) -> Vec<WpMovement> {
    let window = SemesterWindow::parse(semester).unwrap();
    let now = window.usable_until;
    let mut batch = vec![WpMovement::initial_deposit(user_id, &window, dec!(1000), now)];
    for month in &window.wallet_premium.by_month_usability {
        batch.push(WpMovement::monthly_income(user_id, &window, dec!(1000), dec!(40), 4, month, now));
    }
    batch
}

#[tokio::test]
async fn test_users_roundtrip() {
    let store = memory_store().await;
    let user = User::new("u1", "Mario", "Rossi", ClubPack::Premium, at("2023-09-01T10:00:00Z"))
        .with_card("C-001")
        .with_roles(vec![UserRole::Client, UserRole::ClubAdmin]);
    store.insert_user(&user).await.unwrap();

    let found = store.find_user("u1").await.unwrap().unwrap();
    assert_eq!(found.roles, vec![UserRole::Client, UserRole::ClubAdmin]);
    assert!(found.is_admin());

    let by_card = store.find_user_by_card("C-001").await.unwrap().unwrap();
    assert_eq!(by_card.id, "u1");
    assert!(store.find_user_by_card("C-999").await.unwrap().is_none());

    assert!(store.insert_user(&user).await.unwrap_err().is_already_exists());
}

#[tokio::test]
async fn test_premium_aggregation() {
    let store = memory_store().await;
    for movement in [
        entry("alice", dec!(1000), MovementType::DepositAdded, ClubPack::Premium),
        entry("alice", dec!(25.5), MovementType::InterestRecapitalized, ClubPack::Premium),
        entry("alice", dec!(300), MovementType::DepositUsed, ClubPack::Premium),
        entry("alice", dec!(500), MovementType::DepositUnlockedWp, ClubPack::Premium),
        entry("bob", dec!(50), MovementType::DepositAdded, ClubPack::Premium),
        entry("bob", dec!(60), MovementType::DepositTransferred, ClubPack::Premium),
        entry("carol", dec!(800), MovementType::DepositAdded, ClubPack::Basic),
    ] {
        store.insert_movement(&movement).await.unwrap();
    }

    let semester = SemesterId::parse("2023_1").unwrap();
    let result = store.premium_by_semester(semester, None).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].user_id, "alice");
    assert_eq!(result[0].in_amount, dec!(1025.5));
    assert_eq!(result[0].out_amount, dec!(300));
    assert_eq!(result[0].remaining_amount, dec!(726));

    let only_bob: HashSet<String> = ["bob".to_string()].into_iter().collect();
    assert!(store.premium_by_semester(semester, Some(&only_bob)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_premium_aggregation_filters_users_in_query() {
    let store = memory_store().await;
    for movement in [
        entry("alice", dec!(1000), MovementType::DepositAdded, ClubPack::Premium),
        entry("bob", dec!(400), MovementType::DepositAdded, ClubPack::Premium),
        entry("bob", dec!(100), MovementType::DepositUsed, ClubPack::Premium),
        entry("dan", dec!(70), MovementType::DepositAdded, ClubPack::Premium),
    ] {
        store.insert_movement(&movement).await.unwrap();
    }
    let semester = SemesterId::parse("2023_1").unwrap();

    let users: HashSet<String> = ["alice".to_string(), "bob".to_string(), "nobody".to_string()]
        .into_iter()
        .collect();
    let mut result = store.premium_by_semester(semester, Some(&users)).await.unwrap();
    result.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    let ids: Vec<&str> = result.iter().map(|a| a.user_id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
    assert_eq!(result[1].remaining_amount, dec!(300));

    assert!(store.premium_by_semester(semester, Some(&HashSet::new())).await.unwrap().is_empty());
    assert_eq!(store.premium_by_semester(semester, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_wallet_batch_is_idempotent() {
    let store = memory_store().await;
    store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap();

    let err = store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap_err();
    assert!(err.is_already_exists());

    let semester = SemesterId::parse("2022_1").unwrap();
    let stored = store.wp_movements_for_semester("u1", semester).await.unwrap();
    assert_eq!(stored.len(), 25);
    assert!(stored[0].is_initial_deposit());
    assert_eq!(
        stored[1].income().unwrap().withdrawable_from,
        at("2023-07-16T00:00:00Z")
    );
    assert_eq!(
        stored[24].income().unwrap().withdrawable_until,
        at("2025-07-15T23:59:59.999Z")
    );
}

#[tokio::test]
async fn test_versioned_update() {
    let store = memory_store().await;
    let batch = wallet("u1", "2022_1");
    store.insert_wallet_batch(&batch).await.unwrap();

    let now = at("2023-07-20T09:00:00Z");
    let mut wp = store.find_wp_movement(&batch[1].id).await.unwrap().unwrap();
    let stale = wp.clone();

    let unlock = Movement::new(
        "u1",
        dec!(15),
        MovementType::DepositUnlockedWp,
        SemesterId::parse("2023_1").unwrap(),
        ClubPack::Premium,
        now,
    )
    .unwrap();
    wp.apply_withdrawal(unlock, now).unwrap();
    let updated = store.update_wp_movement(&wp).await.unwrap();
    assert_eq!(updated.version, 1);

    let reloaded = store.find_wp_movement(&wp.id).await.unwrap().unwrap();
    assert_eq!(reloaded.version, 1);
    let income = reloaded.income().unwrap();
    assert_eq!(income.withdrawal_remaining, dec!(25));
    assert_eq!(income.withdrawal_movements.len(), 1);

    assert!(store.update_wp_movement(&stale).await.unwrap_err().is_version_conflict());

    let mut missing = stale.clone();
    missing.id = "nope".to_string();
    assert!(store.update_wp_movement(&missing).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_pending_queries() {
    let store = memory_store().await;
    store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap();
    store.insert_wallet_batch(&wallet("u2", "2022_2")).await.unwrap();

    let now = at("2024-02-01T00:00:00Z");
    let users = store.users_with_pending_withdrawals(now).await.unwrap();
    assert_eq!(users, vec!["u1".to_string(), "u2".to_string()]);

    let open = store.withdrawable_wp_movements("u1", None, now).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].income().unwrap().withdrawable_from, at("2024-01-16T00:00:00Z"));

    let other = [SemesterId::parse("2022_2").unwrap()];
    assert!(store.withdrawable_wp_movements("u1", Some(&other[..]), now).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_movement() {
    let store = memory_store().await;
    let movement = entry("u1", dec!(10), MovementType::DepositUnlockedWp, ClubPack::Premium);
    store.insert_movement(&movement).await.unwrap();
    assert_eq!(store.movements_for_user("u1").await.unwrap().len(), 1);

    store.delete_movement(&movement.id).await.unwrap();
    assert!(store.movements_for_user("u1").await.unwrap().is_empty());
    assert!(store.delete_movement(&movement.id).await.unwrap_err().is_not_found());
}
