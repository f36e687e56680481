//! Scheduled recapitalization jobs
//!
//! The end-semester switch fans the Premium balances of an expired
//! semester out as provisioning tasks; the reminder job tells users about
//! brites still locked in the current month.

use crate::aggregator::LedgerAggregator;
use crate::error::{BusinessError, BusinessResult};
use crate::notification::NotificationService;
use crate::services::ServiceContext;
use britewallet_core::{round_brites, SemesterId, SemesterWindow, Task};
use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchReport {
    /// Tasks enqueued
    pub count: usize,
    pub semester: SemesterId,
    pub usable_from: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotifyReport {
    pub success: Vec<String>,
    pub failed: Vec<String>,
}

pub struct RecapitalizationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RecapitalizationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Enqueue one provisioning task per user with a positive Premium
    /// balance in `semester_id`, which must be expired
    pub async fn trigger_end_semester_switch(
        &self,
        semester_id: &str,
        user_ids: Option<&HashSet<String>>,
    ) -> BusinessResult<SwitchReport> {
        let window = SemesterWindow::parse(semester_id)?;
        let now = self.ctx.now();

        if !window.is_expired(now) {
            return Err(BusinessError::invalid_request(format!(
                "semester {} is not expired yet (usable until {})",
                window.id, window.usable_until
            )));
        }

        let aggregates = LedgerAggregator::new(self.ctx)
            .get_premium_by_semester(semester_id, user_ids)
            .await?;

        if aggregates.is_empty() {
            return Err(BusinessError::invalid_request(format!(
                "no premium balance found for semester {}",
                window.id
            )));
        }

        let queue = &self.ctx.config().provisioning_queue;
        let mut users = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates {
            let user_id = aggregate.user_id.clone();
            self.ctx
                .tasks()
                .enqueue(Task::AddBritesToPremiumWallet(aggregate), queue)
                .await?;
            users.push(user_id);
        }

        info!(semester = %window.id, count = users.len(), queue = %queue, "End-semester switch enqueued");

        Ok(SwitchReport {
            count: users.len(),
            semester: window.id,
            usable_from: window.usable_from,
            expired_at: window.usable_until,
            users,
        })
    }

    /// The switch on the most recent expired semester
    pub async fn trigger_last_expired_switch(&self) -> BusinessResult<SwitchReport> {
        let window = SemesterWindow::last_expired(self.ctx.now(), self.ctx.config().last_expired_max_steps)?;
        self.trigger_end_semester_switch(&window.id.to_string(), None).await
    }

    /// Users holding brites in a record open right now
    pub async fn pending_unlock_users(&self) -> BusinessResult<Vec<String>> {
        Ok(self
            .ctx
            .store()
            .users_with_pending_withdrawals(self.ctx.now())
            .await?)
    }

    /// Remind each user of the brites left in the current month.
    ///
    /// Users that are unknown, have nothing to unlock or whose notification
    /// could not be enqueued are reported as failed.
    pub async fn notify_before_recapitalization(&self, user_ids: &[String]) -> BusinessResult<NotifyReport> {
        let now = self.ctx.now();
        let month_name = reminder_month(now).format("%B").to_string();
        let notifications = NotificationService::new(self.ctx);
        let mut report = NotifyReport::default();

        for user_id in user_ids {
            let Some(user) = self.ctx.store().find_user(user_id).await? else {
                warn!(user_id = %user_id, "Unknown user, skipping reminder");
                report.failed.push(user_id.clone());
                continue;
            };

            let movements = self.ctx.store().withdrawable_wp_movements(user_id, None, now).await?;
            let Some(until) = movements
                .iter()
                .find_map(|m| m.income())
                .map(|income| income.withdrawable_until)
            else {
                report.failed.push(user_id.clone());
                continue;
            };

            let remaining = round_brites(
                movements
                    .iter()
                    .filter_map(|m| m.income())
                    .map(|income| income.withdrawal_remaining)
                    .sum::<Decimal>(),
            );

            let notification = notifications.brites_to_unlock(&user, remaining, until, &month_name);
            if notifications.notify(notification).await {
                report.success.push(user_id.clone());
            } else {
                report.failed.push(user_id.clone());
            }
        }

        info!(success = report.success.len(), failed = report.failed.len(), "Unlock reminders sent");
        Ok(report)
    }
}

/// Month a reminder refers to: windows open on the 16th, so before that
/// day the open window started in the previous month
fn reminder_month(now: DateTime<Utc>) -> DateTime<Utc> {
    if now.day() >= 16 {
        now
    } else {
        now.checked_sub_months(Months::new(1)).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_month() {
        let early: DateTime<Utc> = "2024-03-10T08:00:00Z".parse().unwrap();
        assert_eq!(reminder_month(early).format("%B").to_string(), "February");

        let late: DateTime<Utc> = "2024-03-16T00:00:00Z".parse().unwrap();
        assert_eq!(reminder_month(late).format("%B").to_string(), "March");

        let january: DateTime<Utc> = "2024-01-15T23:00:00Z".parse().unwrap();
        assert_eq!(reminder_month(january).format("%B").to_string(), "December");
    }
}
