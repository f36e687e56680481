//! # Movement Module
//!
//! Ledger entries: every balance-affecting brite event for a user.
//! Movements are append-only; the only mutation allowed is deleting an
//! entry as compensation for a failed withdrawal.

use crate::error::CoreResult;
use crate::semester::SemesterWindow;
use crate::semester::SemesterId;
use crate::user::ClubPack;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    // === IN movements ===
    /// Generated when recapitalization occurs
    InterestRecapitalized,
    /// Added by admins
    DepositAdded,

    // === OUT movements ===
    /// Removed by admins
    DepositRemoved,
    /// Transferred by the user to another user
    DepositTransferred,
    /// Spent by the user
    DepositUsed,

    // === Wallet Premium ===
    /// Transfer from a Wallet Premium to another user's ordinary wallet
    #[serde(rename = "deposit_received_wp")]
    DepositReceivedWp,
    /// Unlock from a Wallet Premium to the owner's ordinary wallet
    #[serde(rename = "deposit_unlocked_wp")]
    DepositUnlockedWp,
}

impl MovementType {
    pub const IN_MOVEMENTS: [MovementType; 2] = [
        MovementType::InterestRecapitalized,
        MovementType::DepositAdded,
    ];

    pub const OUT_MOVEMENTS: [MovementType; 3] = [
        MovementType::DepositRemoved,
        MovementType::DepositTransferred,
        MovementType::DepositUsed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::InterestRecapitalized => "interest_recapitalized",
            MovementType::DepositAdded => "deposit_added",
            MovementType::DepositRemoved => "deposit_removed",
            MovementType::DepositTransferred => "deposit_transferred",
            MovementType::DepositUsed => "deposit_used",
            MovementType::DepositReceivedWp => "deposit_received_wp",
            MovementType::DepositUnlockedWp => "deposit_unlocked_wp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "interest_recapitalized" => Some(MovementType::InterestRecapitalized),
            "deposit_added" => Some(MovementType::DepositAdded),
            "deposit_removed" => Some(MovementType::DepositRemoved),
            "deposit_transferred" => Some(MovementType::DepositTransferred),
            "deposit_used" => Some(MovementType::DepositUsed),
            "deposit_received_wp" => Some(MovementType::DepositReceivedWp),
            "deposit_unlocked_wp" => Some(MovementType::DepositUnlockedWp),
            _ => None,
        }
    }

    /// Counts toward the premium-eligible balance
    pub fn is_in(&self) -> bool {
        Self::IN_MOVEMENTS.contains(self)
    }

    /// Counts against the premium-eligible balance
    pub fn is_out(&self) -> bool {
        Self::OUT_MOVEMENTS.contains(self)
    }

    /// Produced by a Wallet Premium withdrawal
    pub fn is_wallet_premium(&self) -> bool {
        matches!(
            self,
            MovementType::DepositReceivedWp | MovementType::DepositUnlockedWp
        )
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry.
///
/// `usable_from`, `expires_at`, `reference_year` and `reference_semester`
/// are derived from `semester_id` when the entry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub user_id: String,
    pub amount_change: Decimal,
    pub movement_type: MovementType,
    pub semester_id: SemesterId,
    pub club_pack: ClubPack,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub usable_from: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reference_year: i32,
    pub reference_semester: u8,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Build a new entry with a fresh id
    pub fn new(
        user_id: &str,
        amount_change: Decimal,
        movement_type: MovementType,
        semester_id: SemesterId,
        club_pack: ClubPack,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let window = SemesterWindow::from_id(semester_id)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount_change,
            movement_type,
            semester_id,
            club_pack,
            created_by: None,
            notes: None,
            usable_from: window.usable_from,
            expires_at: window.usable_until,
            reference_year: semester_id.year(),
            reference_semester: semester_id.half().as_u8(),
            created_at,
        })
    }

    // === Builder methods ===

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_created_by(mut self, user_id: &str) -> Self {
        self.created_by = Some(user_id.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} for {} ({})",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.movement_type,
            self.amount_change,
            self.user_id,
            self.semester_id
        )
    }
}
