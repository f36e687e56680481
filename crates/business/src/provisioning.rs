//! Wallet Premium provisioning
//!
//! Turns the net Premium balance of an expired semester into one initial
//! deposit plus a 24-month schedule of monthly income records.
//!
//! Safe to run more than once for the same user and semester: the existing
//! initial deposit short-circuits the second run, and the batch is written
//! all-or-nothing.

use crate::error::{BusinessError, BusinessResult};
use crate::notification::NotificationService;
use crate::services::ServiceContext;
use britewallet_core::{income_for, PremiumAggregate, SemesterId, SemesterWindow, User, WpMovement};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    /// Records created
    Ok,
    /// An initial deposit was already there; nothing written
    AlreadyExists,
    /// Monthly income rounds to 0; nothing written
    NothingToAdd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOutcome {
    pub status: ProvisionStatus,
    pub user_id: String,
    pub semester: SemesterId,
    /// Created ids on `Ok`, the existing ones on `AlreadyExists`
    pub movement_ids: Vec<String>,
}

pub struct ProvisioningService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ProvisioningService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn provision_aggregate(&self, aggregate: &PremiumAggregate) -> BusinessResult<ProvisionOutcome> {
        self.provision(&aggregate.user_id, &aggregate.semester.to_string(), aggregate.remaining_amount)
            .await
    }

    /// Create the Wallet Premium of `user_id` for `semester_id` from
    /// `remaining_amount`
    pub async fn provision(
        &self,
        user_id: &str,
        semester_id: &str,
        remaining_amount: Decimal,
    ) -> BusinessResult<ProvisionOutcome> {
        let window = SemesterWindow::parse(semester_id)?;
        let store = self.ctx.store();

        let user = store
            .find_user(user_id)
            .await?
            .ok_or_else(|| BusinessError::UserNotFound(user_id.to_string()))?;

        // Not premium anymore: the brites are lost
        if !user.is_premium() {
            return Err(BusinessError::UserNotPremium(user_id.to_string()));
        }

        if let Some(existing) = self.existing(user_id, window.id).await? {
            info!(user_id, semester = %window.id, "Initial movement already exists - nothing done");
            return Ok(existing);
        }

        let percentage = self.ctx.config().income_percentage;
        let income_amount = income_for(remaining_amount, percentage);
        if income_amount <= Decimal::ZERO {
            info!(user_id, semester = %window.id, %remaining_amount, "Monthly income rounds to 0 - nothing to add");
            return Ok(ProvisionOutcome {
                status: ProvisionStatus::NothingToAdd,
                user_id: user_id.to_string(),
                semester: window.id,
                movement_ids: Vec::new(),
            });
        }

        let batch = build_wallet(&user, &window, remaining_amount, income_amount, percentage, self.ctx.now());

        match store.insert_wallet_batch(&batch).await {
            Ok(()) => {}
            // Lost a race against a duplicate delivery of the same task
            Err(e) if e.is_already_exists() => {
                warn!(user_id, semester = %window.id, "Concurrent provisioning detected");
                return match self.existing(user_id, window.id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(e.into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            user_id,
            semester = %window.id,
            initial_amount = %remaining_amount,
            income_amount = %income_amount,
            "Wallet Premium provisioned"
        );

        let notifications = NotificationService::new(self.ctx);
        notifications.notify(notifications.new_semester(&user, window.id)).await;

        Ok(ProvisionOutcome {
            status: ProvisionStatus::Ok,
            user_id: user_id.to_string(),
            semester: window.id,
            movement_ids: batch.into_iter().map(|m| m.id).collect(),
        })
    }

    async fn existing(&self, user_id: &str, semester: SemesterId) -> BusinessResult<Option<ProvisionOutcome>> {
        let movements = self.ctx.store().wp_movements_for_semester(user_id, semester).await?;
        if !movements.iter().any(WpMovement::is_initial_deposit) {
            return Ok(None);
        }

        Ok(Some(ProvisionOutcome {
            status: ProvisionStatus::AlreadyExists,
            user_id: user_id.to_string(),
            semester,
            movement_ids: movements.into_iter().map(|m| m.id).collect(),
        }))
    }
}

/// Initial deposit followed by one monthly record per window
fn build_wallet(
    user: &User,
    window: &SemesterWindow,
    initial_amount: Decimal,
    income_amount: Decimal,
    percentage: u32,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<WpMovement> {
    let mut batch = Vec::with_capacity(window.wallet_premium.by_month_usability.len() + 1);
    batch.push(WpMovement::initial_deposit(&user.id, window, initial_amount, now));

    for month in &window.wallet_premium.by_month_usability {
        batch.push(WpMovement::monthly_income(
            &user.id,
            window,
            initial_amount,
            income_amount,
            percentage,
            month,
            now,
        ));
    }

    batch
}
