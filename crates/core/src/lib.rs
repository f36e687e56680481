//! # Britewallet Core
//!
//! Pure domain of the Wallet Premium engine: semester windows, ledger
//! entries, premium aggregation, Wallet Premium records and their
//! withdrawal rules. No I/O happens here.

pub mod brites;
pub mod clock;
pub mod error;
pub mod movement;
pub mod notification;
pub mod premium;
pub mod semester;
pub mod task;
pub mod user;
pub mod wp_movement;

pub use brites::{income_for, round_brites, INCOME_PERCENTAGE};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use movement::{Movement, MovementType};
pub use notification::{AppType, Notification, NotificationAction, NotificationType, PlatformType, Receiver};
pub use premium::{aggregate_premium, PremiumAggregate};
pub use semester::{
    Half, MonthWindow, PremiumWindow, SemesterId, SemesterWindow, DEFAULT_PAST_VALID_YEARS,
    LAST_EXPIRED_MAX_STEPS, WALLET_PREMIUM_MONTHS,
};
pub use task::{Task, TaskEnvelope};
pub use user::{ClubPack, User, UserRole};
pub use wp_movement::{
    MonthlyIncome, WithdrawalState, WpMovement, WpMovementKind, WpMovementType,
};
