//! Read-side projections of a user's Wallet Premium

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use britewallet_core::{SemesterWindow, WpMovement};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Totals of one semester's Wallet Premium as seen at a given instant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub initial_amount: Decimal,
    pub earned: Decimal,
    /// Already taken from the current month
    pub withdrawn: Decimal,
    /// Still available in the current month
    pub withdrawable: Decimal,
    /// Remainders of every month whose window has opened
    pub no_more_withdrawable: Decimal,
    /// Remainders of every month whose window has not closed
    pub remaining_to_withdraw: Decimal,
    pub semester_details: SemesterWindow,
    /// Null unless the records were asked for
    pub movements: Option<Vec<WpMovement>>,
}

impl SemesterSummary {
    /// Fold the records of one semester, initial deposit first
    pub fn from_movements(
        semester_details: SemesterWindow,
        movements: Vec<WpMovement>,
        now: DateTime<Utc>,
        include_movements: bool,
    ) -> Self {
        let Some(first) = movements.first() else {
            return Self {
                initial_amount: Decimal::ZERO,
                earned: Decimal::ZERO,
                withdrawn: Decimal::ZERO,
                withdrawable: Decimal::ZERO,
                no_more_withdrawable: Decimal::ZERO,
                remaining_to_withdraw: Decimal::ZERO,
                semester_details,
                movements: include_movements.then(Vec::new),
            };
        };

        let initial_amount = first.initial_amount;
        let earned = movements
            .last()
            .and_then(WpMovement::income)
            .map(|income| income.income_amount)
            .unwrap_or(Decimal::ZERO);

        let incomes: Vec<_> = movements.iter().filter_map(WpMovement::income).collect();
        let current = incomes.iter().find(|income| income.is_open_at(now));

        let withdrawn = current.map(|income| income.withdrawn()).unwrap_or(Decimal::ZERO);
        let withdrawable = current
            .map(|income| income.withdrawal_remaining)
            .unwrap_or(Decimal::ZERO);

        let no_more_withdrawable = incomes
            .iter()
            .filter(|income| income.withdrawable_from <= now)
            .map(|income| income.withdrawal_remaining)
            .sum();

        let remaining_to_withdraw = incomes
            .iter()
            .filter(|income| income.withdrawable_until > now)
            .map(|income| income.withdrawal_remaining)
            .sum();

        Self {
            initial_amount,
            earned,
            withdrawn,
            withdrawable,
            no_more_withdrawable,
            remaining_to_withdraw,
            semester_details,
            movements: include_movements.then_some(movements),
        }
    }
}

pub struct SummaryService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SummaryService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn get_semester_summary(
        &self,
        semester_id: &str,
        user_id: &str,
        include_movements: bool,
    ) -> BusinessResult<SemesterSummary> {
        let window = SemesterWindow::parse(semester_id)?;
        let movements = self
            .ctx
            .store()
            .wp_movements_for_semester(user_id, window.id)
            .await?;

        Ok(SemesterSummary::from_movements(
            window,
            movements,
            self.ctx.now(),
            include_movements,
        ))
    }

    /// Summaries of the semesters whose Wallet Premium is running, without
    /// their records; semesters never provisioned are left out
    pub async fn get_user_summary(&self, user_id: &str) -> BusinessResult<Vec<SemesterSummary>> {
        let now = self.ctx.now();
        let semesters = SemesterWindow::past_valid_semesters(now, self.ctx.config().past_valid_years)?;

        let mut summaries = Vec::new();
        for window in semesters {
            let movements = self
                .ctx
                .store()
                .wp_movements_for_semester(user_id, window.id)
                .await?;
            let summary = SemesterSummary::from_movements(window, movements, now, false);
            if summary.initial_amount > Decimal::ZERO {
                summaries.push(summary);
            }
        }

        Ok(summaries)
    }

    pub async fn find_wp_movement(&self, id: &str) -> BusinessResult<WpMovement> {
        self.ctx
            .store()
            .find_wp_movement(id)
            .await?
            .ok_or_else(|| BusinessError::WpMovementNotFound(id.to_string()))
    }
}
