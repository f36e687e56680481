//! Notification payloads handed to the notification queue.
//! Rendering and delivery happen elsewhere.

use crate::error::{CoreError, CoreResult};
use crate::user::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    OrderUpdate,
    NewMessage,
    NewNews,
    WpNewSemester,
    WpBritesToUnlock,
    ClubPackDowngrade,
    ClubPackExpiring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Push,
    Email,
    App,
}

impl PlatformType {
    pub const ALL: [PlatformType; 3] = [PlatformType::Push, PlatformType::Email, PlatformType::App];
}

/// Application the notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Main,
    Club,
    News,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&User> for Receiver {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub text: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub content: String,
    pub app: AppType,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub platforms: Vec<PlatformType>,
    pub receivers: Vec<Receiver>,
    pub action: NotificationAction,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra_data: Value,
}

impl Notification {
    /// Club notification for a single user on every platform
    pub fn for_user(
        user: &User,
        notification_type: NotificationType,
        title: impl Into<String>,
        content: impl Into<String>,
        action: NotificationAction,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            app: AppType::Club,
            notification_type,
            platforms: PlatformType::ALL.to_vec(),
            receivers: vec![Receiver::from(user)],
            action,
            extra_data: Value::Null,
        }
    }

    pub fn with_extra_data(mut self, extra_data: Value) -> Self {
        self.extra_data = extra_data;
        self
    }

    /// Reject payloads the notification service would refuse
    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(CoreError::InvalidNotification("title and content are required".into()));
        }
        if self.platforms.is_empty() {
            return Err(CoreError::InvalidNotification("at least one platform is required".into()));
        }
        if self.receivers.is_empty() {
            return Err(CoreError::InvalidNotification("at least one receiver is required".into()));
        }
        if self.action.text.is_empty() || self.action.link.is_empty() {
            return Err(CoreError::InvalidNotification("action text and link are required".into()));
        }
        Ok(())
    }
}
