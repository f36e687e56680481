//! # Error Module
//!
//! Domain errors for Britewallet, built with thiserror.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
///
/// Pure business-rule failures, nothing infrastructure related.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Semester errors ===
    #[error("Invalid semester format: {0}")]
    InvalidSemesterFormat(String),

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("No expired semester found within {steps} semesters")]
    NoExpiredSemester { steps: usize },

    // === Withdrawal errors ===
    #[error("The movement is not withdrawable: {0}")]
    NotWithdrawable(String),

    #[error("The amount is greater than the withdrawable amount: requested {requested}, available {available}")]
    AmountExceeded {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Notification errors ===
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    // === Parsing errors ===
    #[error("Unknown {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn unknown(field: &'static str, value: &str) -> Self {
        Self::UnknownVariant {
            field,
            value: value.to_string(),
        }
    }

    /// Withdrawal timing or balance violation
    pub fn is_withdrawal_error(&self) -> bool {
        matches!(
            self,
            CoreError::NotWithdrawable(_) | CoreError::AmountExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = CoreError::AmountExceeded {
            requested: dec!(50),
            available: dec!(40),
        };
        assert_eq!(
            err.to_string(),
            "The amount is greater than the withdrawable amount: requested 50, available 40"
        );

        let err = CoreError::InvalidSemesterFormat("2020-1".to_string());
        assert_eq!(err.to_string(), "Invalid semester format: 2020-1");
    }

    #[test]
    fn test_error_checks() {
        assert!(CoreError::NotWithdrawable("locked".to_string()).is_withdrawal_error());
        assert!(!CoreError::unknown("movement type", "gift").is_withdrawal_error());
    }
}
