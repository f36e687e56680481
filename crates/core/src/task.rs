//! # Task Module
//!
//! Jobs handed to the task-dispatch collaborator. Delivery is
//! at-least-once, so every handler must tolerate duplicates.

use crate::notification::Notification;
use crate::premium::PremiumAggregate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "payload", rename_all = "snake_case")]
pub enum Task {
    /// Provision the Wallet Premium of one user for one expired semester
    AddBritesToPremiumWallet(PremiumAggregate),
    /// Hand a notification to the notification service
    CreateNotification(Notification),
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::AddBritesToPremiumWallet(_) => "add_brites_to_premium_wallet",
            Task::CreateNotification(_) => "create_notification",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::AddBritesToPremiumWallet(aggregate) => write!(
                f,
                "{} {} {} ({})",
                self.name(),
                aggregate.user_id,
                aggregate.semester,
                aggregate.remaining_amount
            ),
            Task::CreateNotification(notification) => {
                write!(f, "{} {:?}", self.name(), notification.notification_type)
            }
        }
    }
}

/// A task as stored on a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEnvelope {
    pub id: String,
    pub queue: String,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(flatten)]
    pub task: Task,
}

impl TaskEnvelope {
    pub fn new(task: Task, queue: &str, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            queue: queue.to_string(),
            enqueued_at,
            attempts: 0,
            task,
        }
    }
}
