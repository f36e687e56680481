//! # Wallet Premium Movement Module
//!
//! Records produced by recapitalizing an expired semester:
//! - one `InitialDeposit` per user per semester, never mutated
//! - 24 `MonthlyIncome` records, each withdrawable during its own month
//!
//! A monthly record moves through [`WithdrawalState`]:
//!
//! ```text
//! Locked ──(withdrawable_from)──► Withdrawable ──(remaining <= 0)──► Exhausted
//!                                      │
//!                                      └──(withdrawable_until passes)──► Expired
//! ```

use crate::error::{CoreError, CoreResult};
use crate::movement::{Movement, MovementType};
use crate::semester::{MonthWindow, SemesterId, SemesterWindow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WpMovementType {
    InitialDeposit,
    MonthlyIncome,
}

impl WpMovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WpMovementType::InitialDeposit => "initial_deposit",
            WpMovementType::MonthlyIncome => "monthly_income",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "initial_deposit" => Some(WpMovementType::InitialDeposit),
            "monthly_income" => Some(WpMovementType::MonthlyIncome),
            _ => None,
        }
    }
}

impl fmt::Display for WpMovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a monthly income record stands at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalState {
    /// Window not open yet
    Locked,
    /// Inside the window with something left
    Withdrawable,
    /// Fully withdrawn
    Exhausted,
    /// Window elapsed with brites left; they are lost
    Expired,
}

/// Schedule and withdrawal bookkeeping of one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyIncome {
    pub income_amount: Decimal,
    pub income_percentage: u32,
    pub withdrawable_from: DateTime<Utc>,
    pub withdrawable_until: DateTime<Utc>,
    /// Starts at `income_amount`, decremented by each withdrawal
    pub withdrawal_remaining: Decimal,
    /// Set once `withdrawal_remaining` reaches 0
    pub withdrawal_date: Option<DateTime<Utc>>,
    /// Most recent first
    pub withdrawal_movements: Vec<Movement>,
}

impl MonthlyIncome {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.withdrawable_from <= now && now <= self.withdrawable_until
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> WithdrawalState {
        if self.withdrawal_remaining <= Decimal::ZERO {
            WithdrawalState::Exhausted
        } else if now > self.withdrawable_until {
            WithdrawalState::Expired
        } else if now < self.withdrawable_from {
            WithdrawalState::Locked
        } else {
            WithdrawalState::Withdrawable
        }
    }

    pub fn withdrawn(&self) -> Decimal {
        self.income_amount - self.withdrawal_remaining
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "movementType", rename_all = "snake_case")]
pub enum WpMovementKind {
    InitialDeposit,
    MonthlyIncome(MonthlyIncome),
}

/// A Wallet Premium record.
///
/// `reference_*` fields are derived from `semester` at construction.
/// `version` is bumped by the store on every successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WpMovement {
    pub id: String,
    pub user_id: String,
    pub semester: SemesterId,
    pub reference_semester: u8,
    pub reference_year: i32,
    pub reference_usable_until: DateTime<Utc>,
    pub initial_amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
    #[serde(flatten)]
    pub kind: WpMovementKind,
}

impl WpMovement {
    fn base(
        user_id: &str,
        window: &SemesterWindow,
        initial_amount: Decimal,
        created_at: DateTime<Utc>,
        kind: WpMovementKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            semester: window.id,
            reference_semester: window.half().as_u8(),
            reference_year: window.year(),
            reference_usable_until: window.usable_until,
            initial_amount,
            created_at,
            version: 0,
            kind,
        }
    }

    pub fn initial_deposit(
        user_id: &str,
        window: &SemesterWindow,
        initial_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::base(
            user_id,
            window,
            initial_amount,
            created_at,
            WpMovementKind::InitialDeposit,
        )
    }

    pub fn monthly_income(
        user_id: &str,
        window: &SemesterWindow,
        initial_amount: Decimal,
        income_amount: Decimal,
        income_percentage: u32,
        month: &MonthWindow,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::base(
            user_id,
            window,
            initial_amount,
            created_at,
            WpMovementKind::MonthlyIncome(MonthlyIncome {
                income_amount,
                income_percentage,
                withdrawable_from: month.usable_from,
                withdrawable_until: month.usable_until,
                withdrawal_remaining: income_amount,
                withdrawal_date: None,
                withdrawal_movements: Vec::new(),
            }),
        )
    }

    pub fn movement_type(&self) -> WpMovementType {
        match self.kind {
            WpMovementKind::InitialDeposit => WpMovementType::InitialDeposit,
            WpMovementKind::MonthlyIncome(_) => WpMovementType::MonthlyIncome,
        }
    }

    pub fn is_initial_deposit(&self) -> bool {
        matches!(self.kind, WpMovementKind::InitialDeposit)
    }

    pub fn income(&self) -> Option<&MonthlyIncome> {
        match &self.kind {
            WpMovementKind::MonthlyIncome(income) => Some(income),
            WpMovementKind::InitialDeposit => None,
        }
    }

    /// `None` for an initial deposit
    pub fn state_at(&self, now: DateTime<Utc>) -> Option<WithdrawalState> {
        self.income().map(|income| income.state_at(now))
    }

    pub fn has_withdraw_movements(&self) -> bool {
        self.income()
            .map(|income| !income.withdrawal_movements.is_empty())
            .unwrap_or(false)
    }

    /// Check that `amount` can be withdrawn at `now`.
    ///
    /// `now` must fall inside `[withdrawable_from, withdrawable_until]` and
    /// `amount` may exceed neither the income nor what is left.
    pub fn check_is_withdrawable(&self, amount: Decimal, now: DateTime<Utc>) -> CoreResult<()> {
        let income = self.income().ok_or_else(|| {
            CoreError::NotWithdrawable(format!("{} is an initial deposit", self.id))
        })?;

        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }

        if !income.is_open_at(now) {
            return Err(CoreError::NotWithdrawable(format!(
                "{} is withdrawable from {} until {}",
                self.id,
                income.withdrawable_from.to_rfc3339(),
                income.withdrawable_until.to_rfc3339()
            )));
        }

        if amount > income.income_amount || amount > income.withdrawal_remaining {
            return Err(CoreError::AmountExceeded {
                requested: amount,
                available: income.withdrawal_remaining,
            });
        }

        Ok(())
    }

    /// Record a persisted withdrawal entry.
    ///
    /// Re-checks withdrawability, prepends `entry`, decrements the
    /// remainder by its amount and stamps `withdrawal_date` once nothing is
    /// left.
    pub fn apply_withdrawal(&mut self, entry: Movement, now: DateTime<Utc>) -> CoreResult<()> {
        if !entry.movement_type.is_wallet_premium() {
            return Err(CoreError::unknown(
                "withdrawal movement type",
                entry.movement_type.as_str(),
            ));
        }
        self.check_is_withdrawable(entry.amount_change, now)?;

        if let WpMovementKind::MonthlyIncome(income) = &mut self.kind {
            income.withdrawal_remaining -= entry.amount_change;
            if income.withdrawal_remaining <= Decimal::ZERO {
                income.withdrawal_date = Some(now);
            }
            income.withdrawal_movements.insert(0, entry);
        }

        Ok(())
    }
}

impl fmt::Display for WpMovement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WpMovementKind::InitialDeposit => write!(
                f,
                "{} {} initial deposit {}",
                self.semester, self.user_id, self.initial_amount
            ),
            WpMovementKind::MonthlyIncome(income) => write!(
                f,
                "{} {} {} -> {}: {}/{}",
                self.semester,
                self.user_id,
                income.withdrawable_from.format("%Y-%m-%d"),
                income.withdrawable_until.format("%Y-%m-%d"),
                income.withdrawal_remaining,
                income.income_amount
            ),
        }
    }
}

/// Note of the ledger entry credited to the destination user
pub fn received_note(from_full_name: &str, from_card: Option<&str>) -> String {
    with_card(format!("Wallet Premium - transfer from {}", from_full_name), from_card)
}

/// Note kept inside the Wallet Premium record for a transfer
pub fn transfer_note(to_full_name: &str, to_card: Option<&str>) -> String {
    with_card(format!("Wallet Premium - transfer to {}", to_full_name), to_card)
}

pub fn unlocked_note(month_name: &str) -> String {
    format!("Wallet Premium - brites unlocked for the month of {}", month_name)
}

fn with_card(note: String, card: Option<&str>) -> String {
    match card {
        Some(card) => format!("{} ({})", note, card),
        None => note,
    }
}

/// Kind of ledger entry a withdrawal produces
pub fn withdrawal_movement_type(is_transfer: bool) -> MovementType {
    if is_transfer {
        MovementType::DepositReceivedWp
    } else {
        MovementType::DepositUnlockedWp
    }
}
