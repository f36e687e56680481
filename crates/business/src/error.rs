//! Business layer errors
//!
//! Every failure carries an [`ErrorKind`] tag and an HTTP-status-equivalent
//! severity so outer layers can surface it without inspecting variants.

use britewallet_core::CoreError;
use britewallet_persistence::PersistenceError;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BusinessError {
    // === Validation errors ===
    #[error("Invalid semester format: {0}")]
    InvalidFormat(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Not found errors ===
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No user found with the provided card number: {0}")]
    CardNotFound(String),

    #[error("Wallet Premium movement not found: {0}")]
    WpMovementNotFound(String),

    // === Permission errors ===
    #[error("You are not allowed to withdraw from this wallet: {0}")]
    Forbidden(String),

    #[error("User is no more premium: {0}")]
    UserNotPremium(String),

    // === Withdrawal errors ===
    #[error("The movement is not withdrawable: {0}")]
    NotWithdrawable(String),

    #[error("The amount is greater than the withdrawable amount: requested {requested}, available {available}")]
    AmountExceeded {
        requested: Decimal,
        available: Decimal,
    },

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

/// Kind tag of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidFormat,
    NotFound,
    Forbidden,
    InvalidRequest,
    NotWithdrawable,
    AmountExceeded,
    ValidationFailed,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidFormat => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::InvalidRequest => 400,
            ErrorKind::NotWithdrawable => 406,
            ErrorKind::AmountExceeded => 406,
            ErrorKind::ValidationFailed => 422,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage => 500,
        }
    }
}

impl BusinessError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BusinessError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            BusinessError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            BusinessError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            BusinessError::UserNotFound(_)
            | BusinessError::CardNotFound(_)
            | BusinessError::WpMovementNotFound(_) => ErrorKind::NotFound,
            BusinessError::Forbidden(_) => ErrorKind::Forbidden,
            BusinessError::UserNotPremium(_) => ErrorKind::ValidationFailed,
            BusinessError::NotWithdrawable(_) => ErrorKind::NotWithdrawable,
            BusinessError::AmountExceeded { .. } => ErrorKind::AmountExceeded,
            BusinessError::Config(_) => ErrorKind::ValidationFailed,
            BusinessError::Persistence(e) => match e {
                PersistenceError::NotFound { .. } => ErrorKind::NotFound,
                PersistenceError::AlreadyExists { .. } | PersistenceError::VersionConflict { .. } => {
                    ErrorKind::Conflict
                }
                _ => ErrorKind::Storage,
            },
            BusinessError::Core(e) => match e {
                CoreError::InvalidSemesterFormat(_) | CoreError::DateOutOfRange(_) => {
                    ErrorKind::InvalidFormat
                }
                CoreError::NoExpiredSemester { .. } => ErrorKind::InvalidRequest,
                CoreError::NotWithdrawable(_) => ErrorKind::NotWithdrawable,
                CoreError::AmountExceeded { .. } => ErrorKind::AmountExceeded,
                CoreError::InvalidAmount(_)
                | CoreError::InvalidNotification(_)
                | CoreError::UnknownVariant { .. } => ErrorKind::ValidationFailed,
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Infrastructure failure that may succeed when tried again
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage | ErrorKind::Conflict)
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, BusinessError::Persistence(e) if e.is_version_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kinds_and_status_codes() {
        let cases: Vec<(BusinessError, ErrorKind, u16)> = vec![
            (CoreError::InvalidSemesterFormat("2020-1".into()).into(), ErrorKind::InvalidFormat, 400),
            (BusinessError::UserNotFound("u1".into()), ErrorKind::NotFound, 404),
            (BusinessError::CardNotFound("C-9".into()), ErrorKind::NotFound, 404),
            (BusinessError::Forbidden("u2".into()), ErrorKind::Forbidden, 403),
            (BusinessError::invalid_request("self transfer"), ErrorKind::InvalidRequest, 400),
            (CoreError::NotWithdrawable("locked".into()).into(), ErrorKind::NotWithdrawable, 406),
            (
                CoreError::AmountExceeded { requested: dec!(50), available: dec!(40) }.into(),
                ErrorKind::AmountExceeded,
                406,
            ),
            (BusinessError::validation("amount"), ErrorKind::ValidationFailed, 422),
            (
                PersistenceError::version_conflict("WpMovement", "w1", 3).into(),
                ErrorKind::Conflict,
                409,
            ),
            (PersistenceError::Other("disk".into()).into(), ErrorKind::Storage, 500),
        ];

        for (error, kind, status) in cases {
            assert_eq!(error.kind(), kind, "{}", error);
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[test]
    fn test_retryable() {
        let conflict: BusinessError = PersistenceError::version_conflict("WpMovement", "w1", 0).into();
        assert!(conflict.is_retryable());
        assert!(conflict.is_version_conflict());
        assert!(!BusinessError::UserNotPremium("u1".into()).is_retryable());
        assert!(!BusinessError::UserNotFound("u1".into()).is_retryable());
    }
}
