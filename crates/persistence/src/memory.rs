//! In-memory [`WalletStore`] for tests and dry runs.
//!
//! A single mutex guards all collections, so every call sees a consistent
//! snapshot and batches are applied atomically.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{is_pending_at, sort_wallet, WalletStore};
use async_trait::async_trait;
use britewallet_core::{
    aggregate_premium, Movement, PremiumAggregate, SemesterId, User, WpMovement,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    movements: Vec<Movement>,
    wp_movements: Vec<WpMovement>,
}

#[derive(Default)]
pub struct MemoryWalletStore {
    state: Mutex<State>,
    fail_wp_updates: AtomicBool,
    fail_wallet_batches: AtomicBool,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `update_wp_movement` fail
    pub fn set_fail_wp_updates(&self, fail: bool) {
        self.fail_wp_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every following `insert_wallet_batch` fail
    pub fn set_fail_wallet_batches(&self, fail: bool) {
        self.fail_wallet_batches.store(fail, Ordering::SeqCst);
    }

    fn state(&self) -> PersistenceResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PersistenceError::Other("memory store lock poisoned".to_string()))
    }

    pub fn movement_count(&self) -> PersistenceResult<usize> {
        Ok(self.state()?.movements.len())
    }

    pub fn wp_movement_count(&self) -> PersistenceResult<usize> {
        Ok(self.state()?.wp_movements.len())
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn find_user(&self, id: &str) -> PersistenceResult<Option<User>> {
        Ok(self.state()?.users.get(id).cloned())
    }

    async fn find_user_by_card(&self, card_number: &str) -> PersistenceResult<Option<User>> {
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| u.club_card_number.as_deref() == Some(card_number))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> PersistenceResult<()> {
        let mut state = self.state()?;
        if state.users.contains_key(&user.id) {
            return Err(PersistenceError::already_exists("User", &user.id));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn insert_movement(&self, movement: &Movement) -> PersistenceResult<()> {
        let mut state = self.state()?;
        if state.movements.iter().any(|m| m.id == movement.id) {
            return Err(PersistenceError::already_exists("Movement", &movement.id));
        }
        state.movements.push(movement.clone());
        Ok(())
    }

    async fn delete_movement(&self, id: &str) -> PersistenceResult<()> {
        let mut state = self.state()?;
        let before = state.movements.len();
        state.movements.retain(|m| m.id != id);
        if state.movements.len() == before {
            return Err(PersistenceError::not_found("Movement", id));
        }
        Ok(())
    }

    async fn movements_for_user(&self, user_id: &str) -> PersistenceResult<Vec<Movement>> {
        let mut movements: Vec<Movement> = self
            .state()?
            .movements
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(movements)
    }

    async fn premium_by_semester(
        &self,
        semester: SemesterId,
        user_ids: Option<&HashSet<String>>,
    ) -> PersistenceResult<Vec<PremiumAggregate>> {
        let state = self.state()?;
        Ok(aggregate_premium(&state.movements, semester, user_ids))
    }

    async fn find_wp_movement(&self, id: &str) -> PersistenceResult<Option<WpMovement>> {
        Ok(self
            .state()?
            .wp_movements
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn wp_movements_for_semester(
        &self,
        user_id: &str,
        semester: SemesterId,
    ) -> PersistenceResult<Vec<WpMovement>> {
        let mut movements: Vec<WpMovement> = self
            .state()?
            .wp_movements
            .iter()
            .filter(|m| m.user_id == user_id && m.semester == semester)
            .cloned()
            .collect();
        sort_wallet(&mut movements);
        Ok(movements)
    }

    async fn insert_wallet_batch(&self, batch: &[WpMovement]) -> PersistenceResult<()> {
        if self.fail_wallet_batches.load(Ordering::SeqCst) {
            return Err(PersistenceError::Other(format!(
                "injected failure inserting {} wallet records",
                batch.len()
            )));
        }
        let mut state = self.state()?;

        for new in batch.iter().filter(|m| m.is_initial_deposit()) {
            let exists = state.wp_movements.iter().any(|m| {
                m.is_initial_deposit() && m.user_id == new.user_id && m.semester == new.semester
            });
            if exists {
                return Err(PersistenceError::already_exists(
                    "WpMovement",
                    &format!("{}/{}", new.user_id, new.semester),
                ));
            }
        }

        state.wp_movements.extend(batch.iter().cloned());
        Ok(())
    }

    async fn update_wp_movement(&self, movement: &WpMovement) -> PersistenceResult<WpMovement> {
        if self.fail_wp_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::Other(format!(
                "injected failure updating {}",
                movement.id
            )));
        }

        let mut state = self.state()?;
        let stored = state
            .wp_movements
            .iter_mut()
            .find(|m| m.id == movement.id)
            .ok_or_else(|| PersistenceError::not_found("WpMovement", &movement.id))?;

        if stored.version != movement.version {
            return Err(PersistenceError::version_conflict(
                "WpMovement",
                &movement.id,
                movement.version,
            ));
        }

        let mut updated = movement.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn withdrawable_wp_movements(
        &self,
        user_id: &str,
        semesters: Option<&[SemesterId]>,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<WpMovement>> {
        let mut movements: Vec<WpMovement> = self
            .state()?
            .wp_movements
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| semesters.map_or(true, |s| s.contains(&m.semester)))
            .filter(|m| is_pending_at(m, now))
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.semester);
        Ok(movements)
    }

    async fn users_with_pending_withdrawals(
        &self,
        now: DateTime<Utc>,
    ) -> PersistenceResult<Vec<String>> {
        let users: BTreeSet<String> = self
            .state()?
            .wp_movements
            .iter()
            .filter(|m| is_pending_at(m, now))
            .map(|m| m.user_id.clone())
            .collect();
        Ok(users.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use britewallet_core::{ClubPack, MovementType, SemesterWindow};
    use rust_decimal_macros::dec;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
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
    async fn test_batch_is_refused_when_initial_deposit_exists() {
        let store = MemoryWalletStore::new();
        store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap();

        let err = store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.wp_movement_count().unwrap(), 25);

        // another semester is fine
        store.insert_wallet_batch(&wallet("u1", "2022_2")).await.unwrap();
        assert_eq!(store.wp_movement_count().unwrap(), 50);
    }

    #[tokio::test]
    async fn test_update_detects_stale_version() {
        let store = MemoryWalletStore::new();
        let batch = wallet("u1", "2022_1");
        store.insert_wallet_batch(&batch).await.unwrap();

        let first = batch[1].clone();
        let updated = store.update_wp_movement(&first).await.unwrap();
        assert_eq!(updated.version, 1);

        let err = store.update_wp_movement(&first).await.unwrap_err();
        assert!(err.is_version_conflict());

        store.set_fail_wp_updates(true);
        assert!(store.update_wp_movement(&updated).await.is_err());
    }

    #[tokio::test]
    async fn test_wallet_order_and_pending_queries() {
        let store = MemoryWalletStore::new();
        store.insert_wallet_batch(&wallet("u1", "2022_1")).await.unwrap();
        store.insert_wallet_batch(&wallet("u2", "2022_2")).await.unwrap();

        let semester = SemesterId::parse("2022_1").unwrap();
        let movements = store.wp_movements_for_semester("u1", semester).await.unwrap();
        assert_eq!(movements.len(), 25);
        assert!(movements[0].is_initial_deposit());
        assert!(movements[1].income().unwrap().withdrawable_from < movements[2].income().unwrap().withdrawable_from);

        // 2022_1 months start 2023-07-16, 2022_2 months start 2024-01-16
        let now = at("2023-08-01T00:00:00Z");
        let open = store.withdrawable_wp_movements("u1", None, now).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(store.users_with_pending_withdrawals(now).await.unwrap(), vec!["u1".to_string()]);

        let now = at("2024-02-01T00:00:00Z");
        let users = store.users_with_pending_withdrawals(now).await.unwrap();
        assert_eq!(users, vec!["u1".to_string(), "u2".to_string()]);
        let only = [SemesterId::parse("2022_2").unwrap()];
        assert!(store.withdrawable_wp_movements("u1", Some(&only[..]), now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_movements_and_aggregation() {
        let store = MemoryWalletStore::new();
        let semester = SemesterId::parse("2023_1").unwrap();
        let deposit = Movement::new("u1", dec!(500), MovementType::DepositAdded, semester, ClubPack::Premium, Utc::now()).unwrap();
        let used = Movement::new("u1", dec!(100), MovementType::DepositUsed, semester, ClubPack::Premium, Utc::now()).unwrap();
        store.insert_movement(&deposit).await.unwrap();
        store.insert_movement(&used).await.unwrap();

        let result = store.premium_by_semester(semester, None).await.unwrap();
        assert_eq!(result[0].remaining_amount, dec!(400));

        store.delete_movement(&used.id).await.unwrap();
        assert!(store.delete_movement(&used.id).await.unwrap_err().is_not_found());
        assert_eq!(store.movements_for_user("u1").await.unwrap().len(), 1);
    }
}
