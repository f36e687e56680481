//! # Brites Module
//!
//! Arithmetic on brite amounts. Amounts are `rust_decimal::Decimal`;
//! whole-brite rounding is half away from zero (0.5 -> 1, 1.5 -> 2).

use rust_decimal::{Decimal, RoundingStrategy};

/// Monthly income percentage of a recapitalized balance
pub const INCOME_PERCENTAGE: u32 = 4;

/// Round to whole brites, half away from zero
pub fn round_brites(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(amount * percentage / 100)`
pub fn income_for(amount: Decimal, percentage: u32) -> Decimal {
    round_brites(amount * Decimal::from(percentage) / Decimal::ONE_HUNDRED)
}
