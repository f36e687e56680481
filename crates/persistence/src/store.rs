//! The durable record store the wallet services run against.

use crate::error::PersistenceResult;
use async_trait::async_trait;
use britewallet_core::{Movement, PremiumAggregate, SemesterId, User, WpMovement};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Users, ledger entries and Wallet Premium records.
///
/// Implementations must give:
/// - a consistent snapshot for [`WalletStore::premium_by_semester`]
/// - all-or-nothing [`WalletStore::insert_wallet_batch`], refused with
///   `AlreadyExists` when the user already holds an initial deposit for
///   the semester
/// - optimistic [`WalletStore::update_wp_movement`]: the stored `version`
///   must equal the one passed in, otherwise `VersionConflict`
#[async_trait]
pub trait WalletStore: Send + Sync {
    // === Users ===
    async fn find_user(&self, id: &str) -> PersistenceResult<Option<User>>;

    async fn find_user_by_card(&self, card_number: &str) -> PersistenceResult<Option<User>>;

    async fn insert_user(&self, user: &User) -> PersistenceResult<()>;

    // === Ledger ===
    async fn insert_movement(&self, movement: &Movement) -> PersistenceResult<()>;

    async fn delete_movement(&self, id: &str) -> PersistenceResult<()>;

    /// Entries of a user, most recent first
    async fn movements_for_user(&self, user_id: &str) -> PersistenceResult<Vec<Movement>>;

    /// Net Premium balance per user for `semester`
    async fn premium_by_semester(
        &self,
        semester: SemesterId,
        user_ids: Option<&HashSet<String>>,
    ) -> PersistenceResult<Vec<PremiumAggregate>>;

    // === Wallet Premium ===
    async fn find_wp_movement(&self, id: &str) -> PersistenceResult<Option<WpMovement>>;

    /// Records of a user for one semester: the initial deposit first, then
    /// the monthly records by `withdrawable_from`
    async fn wp_movements_for_semester(
        &self,
        user_id: &str,
        semester: SemesterId,
    ) -> PersistenceResult<Vec<WpMovement>>;

    async fn insert_wallet_batch(&self, batch: &[WpMovement]) -> PersistenceResult<()>;

    /// Persist the mutable withdrawal fields; returns the record with its
    /// new version
    async fn update_wp_movement(&self, movement: &WpMovement) -> PersistenceResult<WpMovement>;

    /// Monthly records of a user open at `now` with something left,
    /// restricted to `semesters` when given
    async fn withdrawable_wp_movements(
        &self,
        user_id: &str,
        semesters: Option<&[SemesterId]>,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<WpMovement>>;

    /// Users holding at least one monthly record open at `now` with
    /// something left
    async fn users_with_pending_withdrawals(
        &self,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<String>>;
}

/// Open at `now` with a positive remainder
pub(crate) fn is_pending_at(movement: &WpMovement, now: DateTime<Utc>) -> bool {
    movement
        .income()
        .map(|income| income.is_open_at(now) && income.withdrawal_remaining > rust_decimal::Decimal::ZERO)
        .unwrap_or(false)
}

/// Initial deposit first, then monthly records by window start
pub(crate) fn sort_wallet(movements: &mut [WpMovement]) {
    movements.sort_by_key(|m| {
        (
            !m.is_initial_deposit(),
            m.income().map(|income| income.withdrawable_from),
        )
    });
}
