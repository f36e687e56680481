//! Withdrawals from Wallet Premium monthly records
//!
//! A withdrawal writes two records: a ledger entry for the destination
//! user, then the updated monthly record. If the second write fails the
//! ledger entry is deleted again before the error is returned.
//!
//! Concurrent withdrawals on one record are serialized by the store's
//! optimistic version check; a lost race reloads the record and tries
//! again, up to `max_withdraw_retries` times.

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use britewallet_core::wp_movement::{
    received_note, transfer_note, unlocked_note, withdrawal_movement_type,
};
use britewallet_core::{ClubPack, Movement, SemesterId, SemesterWindow, User, WpMovement};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

pub struct WithdrawalService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> WithdrawalService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load the acting user and the record, then [`Self::withdraw`]
    pub async fn withdraw_by_id(
        &self,
        wp_movement_id: &str,
        amount: Decimal,
        acting_user_id: &str,
        destination_card: Option<&str>,
    ) -> BusinessResult<WpMovement> {
        let acting = self.load_user(acting_user_id).await?;
        let wp_movement = self
            .ctx
            .store()
            .find_wp_movement(wp_movement_id)
            .await?
            .ok_or_else(|| BusinessError::WpMovementNotFound(wp_movement_id.to_string()))?;

        self.withdraw(wp_movement, amount, &acting, destination_card).await
    }

    /// Withdraw `amount` from a monthly record.
    ///
    /// Without a card number the brites are unlocked to the acting user;
    /// with one they are transferred to the card's owner.
    pub async fn withdraw(
        &self,
        wp_movement: WpMovement,
        amount: Decimal,
        acting: &User,
        destination_card: Option<&str>,
    ) -> BusinessResult<WpMovement> {
        if wp_movement.user_id != acting.id && !acting.is_admin() {
            return Err(BusinessError::Forbidden(wp_movement.id.clone()));
        }

        if amount <= Decimal::ZERO {
            return Err(BusinessError::validation(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }

        if destination_card.is_some() && destination_card == acting.club_card_number.as_deref() {
            return Err(BusinessError::invalid_request(
                "You must specify a different club card number than your own",
            ));
        }

        let destination = match destination_card {
            Some(card) => self
                .ctx
                .store()
                .find_user_by_card(card)
                .await?
                .ok_or_else(|| BusinessError::CardNotFound(card.to_string()))?,
            None => acting.clone(),
        };
        let is_transfer = destination_card.is_some();

        let now = self.ctx.now();
        wp_movement.check_is_withdrawable(amount, now)?;

        let entry = ledger_entry(acting, &destination, amount, is_transfer, now)?;
        self.ctx.store().insert_movement(&entry).await?;

        // The copy kept in the record names who received the brites
        let mut recorded = entry.clone();
        if is_transfer {
            recorded.notes = Some(transfer_note(
                &destination.full_name(),
                destination.club_card_number.as_deref(),
            ));
        }

        match self.record(wp_movement, recorded, now).await {
            Ok(updated) => {
                info!(
                    wp_movement_id = %updated.id,
                    movement_id = %entry.id,
                    %amount,
                    from = %updated.user_id,
                    to = %destination.id,
                    is_transfer,
                    "Wallet Premium withdrawal recorded"
                );
                Ok(updated)
            }
            Err(e) => {
                warn!(movement_id = %entry.id, error = %e, "Withdrawal failed, deleting its ledger entry");
                if let Err(rollback) = self.ctx.store().delete_movement(&entry.id).await {
                    warn!(movement_id = %entry.id, error = %rollback, "Compensating delete failed");
                }
                Err(e)
            }
        }
    }

    /// Apply the entry to the record and persist it, reloading the record
    /// on a version conflict
    async fn record(&self, mut current: WpMovement, entry: Movement, now: DateTime<Utc>) -> BusinessResult<WpMovement> {
        let max_retries = self.ctx.config().max_withdraw_retries;
        let mut attempt = 0;

        loop {
            let mut next = current.clone();
            next.apply_withdrawal(entry.clone(), now)?;

            match self.ctx.store().update_wp_movement(&next).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_version_conflict() && attempt < max_retries => {
                    attempt += 1;
                    warn!(wp_movement_id = %current.id, attempt, "Concurrent update, reloading record");
                    current = self
                        .ctx
                        .store()
                        .find_wp_movement(&current.id)
                        .await?
                        .ok_or_else(|| BusinessError::WpMovementNotFound(current.id.clone()))?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Withdraw across semesters for one user.
    ///
    /// With one semester `total_amount` comes out of its open record. With
    /// several, `total_amount` must equal everything currently withdrawable
    /// and each open record is emptied.
    pub async fn withdraw_by_semester(
        &self,
        acting: &User,
        target_user_id: Option<&str>,
        semester_ids: &[String],
        total_amount: Decimal,
        destination_card: Option<&str>,
    ) -> BusinessResult<Vec<WpMovement>> {
        if total_amount <= Decimal::ZERO {
            return Err(BusinessError::validation(format!(
                "withdrawal amount must be positive, got {}",
                total_amount
            )));
        }
        if semester_ids.is_empty() {
            return Err(BusinessError::validation("at least one semester is required"));
        }

        let mut semesters: Vec<SemesterId> = Vec::with_capacity(semester_ids.len());
        for id in semester_ids {
            let semester = SemesterId::parse(id).map_err(|_| BusinessError::InvalidFormat(id.clone()))?;
            if !semesters.contains(&semester) {
                semesters.push(semester);
            }
        }

        // Admins act on the named user, everyone else on themselves
        let owner = if acting.is_admin() {
            let user_id = target_user_id
                .ok_or_else(|| BusinessError::validation("userId is required for admins"))?;
            self.load_user(user_id).await?
        } else {
            acting.clone()
        };

        let now = self.ctx.now();
        let movements = self
            .ctx
            .store()
            .withdrawable_wp_movements(&owner.id, Some(semesters.as_slice()), now)
            .await?;

        if movements.is_empty() {
            return Err(BusinessError::NotWithdrawable(format!(
                "no withdrawable movements for {} in {}",
                owner.id,
                semester_ids.join(", ")
            )));
        }

        let total_available: Decimal = movements
            .iter()
            .filter_map(|m| m.income())
            .map(|income| income.withdrawal_remaining)
            .sum();
        let multiple = semesters.len() > 1;

        if multiple && total_available != total_amount {
            return Err(BusinessError::AmountExceeded {
                requested: total_amount,
                available: total_available,
            });
        }

        let mut updated = Vec::with_capacity(movements.len());
        for movement in movements {
            let amount = match (multiple, movement.income()) {
                (true, Some(income)) => income.withdrawal_remaining,
                _ => total_amount,
            };
            updated.push(self.withdraw(movement, amount, acting, destination_card).await?);
        }

        Ok(updated)
    }

    async fn load_user(&self, user_id: &str) -> BusinessResult<User> {
        self.ctx
            .store()
            .find_user(user_id)
            .await?
            .ok_or_else(|| BusinessError::UserNotFound(user_id.to_string()))
    }
}

/// Ledger entry crediting `destination`, booked on the previous semester
fn ledger_entry(
    acting: &User,
    destination: &User,
    amount: Decimal,
    is_transfer: bool,
    now: DateTime<Utc>,
) -> BusinessResult<Movement> {
    let semester = SemesterWindow::previous(None, now)?.id;
    let notes = if is_transfer {
        received_note(&acting.full_name(), acting.club_card_number.as_deref())
    } else {
        unlocked_note(&now.format("%B").to_string())
    };

    Ok(Movement::new(
        &destination.id,
        amount,
        withdrawal_movement_type(is_transfer),
        semester,
        ClubPack::Premium,
        now,
    )?
    .with_created_by(&acting.id)
    .with_notes(&notes))
}
