//! Runtime settings of the wallet services.

use crate::error::{BusinessError, BusinessResult};
use britewallet_core::{DEFAULT_PAST_VALID_YEARS, INCOME_PERCENTAGE, LAST_EXPIRED_MAX_STEPS};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletConfig {
    /// Monthly income as a percentage of the recapitalized balance
    pub income_percentage: u32,
    /// How far back `get_user_summary` looks
    pub past_valid_years: i32,
    /// Bound of the backward walk in `last_expired`
    pub last_expired_max_steps: usize,
    pub provisioning_queue: String,
    pub notification_queue: String,
    /// Base of the links put in notifications
    pub frontend_url: String,
    /// Optimistic-update retries of one withdrawal
    pub max_withdraw_retries: u32,
    /// Attempts of one provisioning task before it is reported failed
    pub max_task_attempts: u32,
    /// Pause between task attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            income_percentage: INCOME_PERCENTAGE,
            past_valid_years: DEFAULT_PAST_VALID_YEARS,
            last_expired_max_steps: LAST_EXPIRED_MAX_STEPS,
            provisioning_queue: "wallet-premium".to_string(),
            notification_queue: "notifications".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            max_withdraw_retries: 3,
            max_task_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl WalletConfig {
    /// Read a JSON file; missing fields take their default
    pub fn from_file<P: AsRef<Path>>(path: P) -> BusinessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BusinessError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| BusinessError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BusinessResult<()> {
        if self.income_percentage == 0 || self.income_percentage > 100 {
            return Err(BusinessError::Config(format!(
                "incomePercentage must be within 1..=100, got {}",
                self.income_percentage
            )));
        }
        if self.provisioning_queue.is_empty() || self.notification_queue.is_empty() {
            return Err(BusinessError::Config("queue names must not be empty".to_string()));
        }
        if self.max_task_attempts == 0 {
            return Err(BusinessError::Config("maxTaskAttempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_frontend_url(mut self, url: &str) -> Self {
        self.frontend_url = url.trim_end_matches('/').to_string();
        self
    }
}
