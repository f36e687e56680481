//! [`WalletStore`] over SQLite.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::repos::{MovementRepo, UserRepo, WpMovementRepo};
use crate::store::{is_pending_at, WalletStore};
use async_trait::async_trait;
use britewallet_core::{
    aggregate_premium, Movement, PremiumAggregate, SemesterId, User, WpMovement,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

#[derive(Clone)]
pub struct SqliteWalletStore {
    pool: SqlitePool,
}

impl SqliteWalletStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl WalletStore for SqliteWalletStore {
    async fn find_user(&self, id: &str) -> PersistenceResult<Option<User>> {
        UserRepo::get_by_id(&self.pool, id).await
    }

    async fn find_user_by_card(&self, card_number: &str) -> PersistenceResult<Option<User>> {
        UserRepo::get_by_card(&self.pool, card_number).await
    }

    async fn insert_user(&self, user: &User) -> PersistenceResult<()> {
        UserRepo::insert(&self.pool, user).await
    }

    async fn insert_movement(&self, movement: &Movement) -> PersistenceResult<()> {
        MovementRepo::insert(&self.pool, movement).await
    }

    async fn delete_movement(&self, id: &str) -> PersistenceResult<()> {
        MovementRepo::delete(&self.pool, id).await
    }

    async fn movements_for_user(&self, user_id: &str) -> PersistenceResult<Vec<Movement>> {
        MovementRepo::get_by_user(&self.pool, user_id).await
    }

    /// Entries are read inside one transaction, so the IN and OUT sides
    /// come from the same snapshot.
    async fn premium_by_semester(
        &self,
        semester: SemesterId,
        user_ids: Option<&HashSet<String>>,
    ) -> PersistenceResult<Vec<PremiumAggregate>> {
        let mut tx = self.pool.begin().await?;
        let entries = MovementRepo::premium_entries(&mut tx, semester, user_ids).await?;
        tx.commit().await?;

        debug!(semester = %semester, entries = entries.len(), "Aggregating premium entries");
        Ok(aggregate_premium(&entries, semester, user_ids))
    }

    async fn find_wp_movement(&self, id: &str) -> PersistenceResult<Option<WpMovement>> {
        WpMovementRepo::get_by_id(&self.pool, id).await
    }

    async fn wp_movements_for_semester(
        &self,
        user_id: &str,
        semester: SemesterId,
    ) -> PersistenceResult<Vec<WpMovement>> {
        WpMovementRepo::get_by_user_semester(&self.pool, user_id, semester).await
    }

    async fn insert_wallet_batch(&self, batch: &[WpMovement]) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;

        for wp in batch.iter().filter(|m| m.is_initial_deposit()) {
            if WpMovementRepo::initial_deposit_exists(&mut tx, &wp.user_id, wp.semester).await? {
                return Err(PersistenceError::already_exists(
                    "WpMovement",
                    &format!("{}/{}", wp.user_id, wp.semester),
                ));
            }
        }

        // The unique index on initial deposits still guards against a
        // concurrent batch slipping in between the check and the insert.
        for wp in batch {
            WpMovementRepo::insert(&mut tx, wp).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_wp_movement(&self, movement: &WpMovement) -> PersistenceResult<WpMovement> {
        WpMovementRepo::update_versioned(&self.pool, movement).await?;
        let mut updated = movement.clone();
        updated.version += 1;
        Ok(updated)
    }

    async fn withdrawable_wp_movements(
        &self,
        user_id: &str,
        semesters: Option<&[SemesterId]>,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<WpMovement>> {
        Ok(WpMovementRepo::get_open_monthly(&self.pool, Some(user_id))
            .await?
            .into_iter()
            .filter(|m| semesters.map_or(true, |s| s.contains(&m.semester)))
            .filter(|m| is_pending_at(m, now))
            .collect())
    }

    async fn users_with_pending_withdrawals(
        &self,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<String>> {
        let users: BTreeSet<String> = WpMovementRepo::get_open_monthly(&self.pool, None)
            .await?
            .into_iter()
            .filter(|m| is_pending_at(m, now))
            .map(|m| m.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }
}
