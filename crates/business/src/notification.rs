//! Wallet Premium notifications
//!
//! Building the payloads and handing them to the notification queue.
//! Sending is fire-and-forget: a failure is logged and never propagated.

use crate::services::ServiceContext;
use britewallet_core::{
    Notification, NotificationAction, NotificationType, SemesterId, Task, User,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

const OPEN_WALLET: &str = "Open Wallet Premium";

pub struct NotificationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> NotificationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Enqueue `notification`; returns whether it was accepted
    pub async fn notify(&self, notification: Notification) -> bool {
        if let Err(e) = notification.validate() {
            warn!(error = %e, "Dropping invalid notification");
            return false;
        }

        let kind = notification.notification_type;
        let queue = &self.ctx.config().notification_queue;
        match self
            .ctx
            .tasks()
            .enqueue(Task::CreateNotification(notification), queue)
            .await
        {
            Ok(envelope) => {
                info!(task_id = %envelope.id, ?kind, queue = %queue, "Notification enqueued");
                true
            }
            Err(e) => {
                warn!(error = %e, ?kind, queue = %queue, "Failed to enqueue notification");
                false
            }
        }
    }

    /// Told after the Wallet Premium of `semester` has been provisioned
    pub fn new_semester(&self, user: &User, semester: SemesterId) -> Notification {
        let link = format!("{}/walletPremium?semester={}", self.ctx.config().frontend_url, semester);

        Notification::for_user(
            user,
            NotificationType::WpNewSemester,
            "WP - New semester added",
            format!(
                "The expired brites of semester {} have been added to your Wallet Premium. \
                 Open your wallet to find out how to use them!",
                semester
            ),
            NotificationAction {
                text: OPEN_WALLET.to_string(),
                link: link.clone(),
            },
        )
        .with_extra_data(json!({
            "user": { "firstName": user.first_name, "lastName": user.last_name },
            "semester": semester.to_string(),
            "actionLink": link,
        }))
    }

    /// Reminder of brites still to unlock for `month_name`
    pub fn brites_to_unlock(
        &self,
        user: &User,
        remaining: Decimal,
        withdrawable_until: DateTime<Utc>,
        month_name: &str,
    ) -> Notification {
        let link = format!("{}/walletPremium", self.ctx.config().frontend_url);
        let until = withdrawable_until.format("%d/%m/%Y %H:%M").to_string();

        Notification::for_user(
            user,
            NotificationType::WpBritesToUnlock,
            format!("WP - Brites to unlock for {}", month_name),
            format!(
                "For the month of {}, your Wallet Premium still holds {} brites to unlock by {}. \
                 After that date the brites will no longer be available. \
                 Open your wallet to unlock them now!",
                month_name, remaining, until
            ),
            NotificationAction {
                text: OPEN_WALLET.to_string(),
                link: link.clone(),
            },
        )
        .with_extra_data(json!({
            "user": { "firstName": user.first_name, "lastName": user.last_name },
            "remaining": remaining.to_string(),
            "userIsPremium": user.is_premium(),
            "month": month_name,
            "withdrawableUntil": until,
            "actionLink": link,
        }))
    }
}
