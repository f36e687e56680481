//! Database schema definitions
//!
//! DDL plus row types for sqlx mapping. Decimals are stored as TEXT,
//! enums as their code string, lists as JSON TEXT.

use crate::error::{PersistenceError, PersistenceResult};
use britewallet_core::{
    ClubPack, MonthlyIncome, Movement, MovementType, SemesterId, User, UserRole, WpMovement,
    WpMovementKind, WpMovementType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT,
    club_pack TEXT NOT NULL,
    club_card_number TEXT UNIQUE,
    roles TEXT NOT NULL DEFAULT '[]',
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS movements (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    amount_change TEXT NOT NULL,
    movement_type TEXT NOT NULL,
    semester_id TEXT NOT NULL,
    club_pack TEXT NOT NULL,
    created_by TEXT,
    notes TEXT,
    usable_from DATETIME NOT NULL,
    expires_at DATETIME NOT NULL,
    reference_year INTEGER NOT NULL,
    reference_semester INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movements_semester_pack
    ON movements (semester_id, club_pack);
CREATE INDEX IF NOT EXISTS idx_movements_user ON movements (user_id);

CREATE TABLE IF NOT EXISTS wp_movements (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    movement_type TEXT NOT NULL,
    semester TEXT NOT NULL,
    reference_semester INTEGER NOT NULL,
    reference_year INTEGER NOT NULL,
    reference_usable_until DATETIME NOT NULL,
    initial_amount TEXT NOT NULL,
    income_amount TEXT,
    income_percentage INTEGER,
    withdrawable_from DATETIME,
    withdrawable_until DATETIME,
    withdrawal_remaining TEXT,
    withdrawal_date DATETIME,
    withdrawal_movements TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_wp_movements_initial_deposit
    ON wp_movements (user_id, semester)
    WHERE movement_type = 'initial_deposit';
CREATE INDEX IF NOT EXISTS idx_wp_movements_user_semester
    ON wp_movements (user_id, semester);
"#;

/// Row type for table `users`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub club_pack: String,
    pub club_card_number: Option<String>,
    pub roles: String, // JSON array
    pub created_at: DateTime<Utc>,
}

/// Row type for table `movements`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MovementRow {
    pub id: String,
    pub user_id: String,
    pub amount_change: String, // Decimal stored as TEXT
    pub movement_type: String,
    pub semester_id: String,
    pub club_pack: String,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub usable_from: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reference_year: i64,
    pub reference_semester: i64,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `wp_movements`; monthly fields are NULL on an
/// initial deposit
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WpMovementRow {
    pub id: String,
    pub user_id: String,
    pub movement_type: String,
    pub semester: String,
    pub reference_semester: i64,
    pub reference_year: i64,
    pub reference_usable_until: DateTime<Utc>,
    pub initial_amount: String,
    pub income_amount: Option<String>,
    pub income_percentage: Option<i64>,
    pub withdrawable_from: Option<DateTime<Utc>>,
    pub withdrawable_until: Option<DateTime<Utc>>,
    pub withdrawal_remaining: Option<String>,
    pub withdrawal_date: Option<DateTime<Utc>>,
    pub withdrawal_movements: Option<String>, // JSON array of movements
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

// === Conversion implementations ===

pub(crate) fn parse_decimal(value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value).map_err(|e| PersistenceError::InvalidDecimal(format!("{}: {}", value, e)))
}

fn parse_semester(value: &str) -> PersistenceResult<SemesterId> {
    Ok(SemesterId::parse(value)?)
}

fn required<T>(value: Option<T>, field: &str, id: &str) -> PersistenceResult<T> {
    value.ok_or_else(|| PersistenceError::Other(format!("wp_movements.{} is NULL for {}", field, id)))
}

impl TryFrom<&User> for UserRow {
    type Error = PersistenceError;

    fn try_from(user: &User) -> PersistenceResult<Self> {
        Ok(Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            club_pack: user.club_pack.as_str().to_string(),
            club_card_number: user.club_card_number.clone(),
            roles: serde_json::to_string(&user.roles)?,
            created_at: user.created_at,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = PersistenceError;

    fn try_from(row: UserRow) -> PersistenceResult<Self> {
        let club_pack = ClubPack::from_str(&row.club_pack)
            .ok_or_else(|| PersistenceError::invalid_enum("club_pack", &row.club_pack))?;
        let roles: Vec<UserRole> = serde_json::from_str(&row.roles)?;

        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            club_pack,
            club_card_number: row.club_card_number,
            roles,
            created_at: row.created_at,
        })
    }
}

impl From<&Movement> for MovementRow {
    fn from(movement: &Movement) -> Self {
        Self {
            id: movement.id.clone(),
            user_id: movement.user_id.clone(),
            amount_change: movement.amount_change.to_string(),
            movement_type: movement.movement_type.as_str().to_string(),
            semester_id: movement.semester_id.to_string(),
            club_pack: movement.club_pack.as_str().to_string(),
            created_by: movement.created_by.clone(),
            notes: movement.notes.clone(),
            usable_from: movement.usable_from,
            expires_at: movement.expires_at,
            reference_year: i64::from(movement.reference_year),
            reference_semester: i64::from(movement.reference_semester),
            created_at: movement.created_at,
        }
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = PersistenceError;

    fn try_from(row: MovementRow) -> PersistenceResult<Self> {
        let movement_type = MovementType::from_str(&row.movement_type)
            .ok_or_else(|| PersistenceError::invalid_enum("movement_type", &row.movement_type))?;
        let club_pack = ClubPack::from_str(&row.club_pack)
            .ok_or_else(|| PersistenceError::invalid_enum("club_pack", &row.club_pack))?;

        Ok(Movement {
            amount_change: parse_decimal(&row.amount_change)?,
            semester_id: parse_semester(&row.semester_id)?,
            movement_type,
            club_pack,
            reference_year: row.reference_year as i32,
            reference_semester: row.reference_semester as u8,
            id: row.id,
            user_id: row.user_id,
            created_by: row.created_by,
            notes: row.notes,
            usable_from: row.usable_from,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<&WpMovement> for WpMovementRow {
    type Error = PersistenceError;

    fn try_from(wp: &WpMovement) -> PersistenceResult<Self> {
        let mut row = Self {
            id: wp.id.clone(),
            user_id: wp.user_id.clone(),
            movement_type: wp.movement_type().as_str().to_string(),
            semester: wp.semester.to_string(),
            reference_semester: i64::from(wp.reference_semester),
            reference_year: i64::from(wp.reference_year),
            reference_usable_until: wp.reference_usable_until,
            initial_amount: wp.initial_amount.to_string(),
            income_amount: None,
            income_percentage: None,
            withdrawable_from: None,
            withdrawable_until: None,
            withdrawal_remaining: None,
            withdrawal_date: None,
            withdrawal_movements: None,
            version: wp.version,
            created_at: wp.created_at,
        };

        if let Some(income) = wp.income() {
            row.income_amount = Some(income.income_amount.to_string());
            row.income_percentage = Some(i64::from(income.income_percentage));
            row.withdrawable_from = Some(income.withdrawable_from);
            row.withdrawable_until = Some(income.withdrawable_until);
            row.withdrawal_remaining = Some(income.withdrawal_remaining.to_string());
            row.withdrawal_date = income.withdrawal_date;
            row.withdrawal_movements = Some(serde_json::to_string(&income.withdrawal_movements)?);
        }

        Ok(row)
    }
}

impl TryFrom<WpMovementRow> for WpMovement {
    type Error = PersistenceError;

    fn try_from(row: WpMovementRow) -> PersistenceResult<Self> {
        let movement_type = WpMovementType::from_str(&row.movement_type)
            .ok_or_else(|| PersistenceError::invalid_enum("movement_type", &row.movement_type))?;

        let kind = match movement_type {
            WpMovementType::InitialDeposit => WpMovementKind::InitialDeposit,
            WpMovementType::MonthlyIncome => {
                let income_amount = required(row.income_amount.as_deref(), "income_amount", &row.id)?;
                let remaining = required(row.withdrawal_remaining.as_deref(), "withdrawal_remaining", &row.id)?;
                let withdrawal_movements = match row.withdrawal_movements.as_deref() {
                    Some(json) => serde_json::from_str(json)?,
                    None => Vec::new(),
                };

                WpMovementKind::MonthlyIncome(MonthlyIncome {
                    income_amount: parse_decimal(income_amount)?,
                    income_percentage: required(row.income_percentage, "income_percentage", &row.id)? as u32,
                    withdrawable_from: required(row.withdrawable_from, "withdrawable_from", &row.id)?,
                    withdrawable_until: required(row.withdrawable_until, "withdrawable_until", &row.id)?,
                    withdrawal_remaining: parse_decimal(remaining)?,
                    withdrawal_date: row.withdrawal_date,
                    withdrawal_movements,
                })
            }
        };

        Ok(WpMovement {
            semester: parse_semester(&row.semester)?,
            initial_amount: parse_decimal(&row.initial_amount)?,
            reference_semester: row.reference_semester as u8,
            reference_year: row.reference_year as i32,
            reference_usable_until: row.reference_usable_until,
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            version: row.version,
            kind,
        })
    }
}
