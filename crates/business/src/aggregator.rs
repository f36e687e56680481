//! Ledger aggregation - net Premium balance per user per semester

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use britewallet_core::{PremiumAggregate, SemesterId};
use std::collections::HashSet;
use tracing::debug;

pub struct LedgerAggregator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerAggregator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Users of `semester_id` (restricted to `user_ids` when given) whose
    /// rounded IN minus OUT is positive. Read-only.
    pub async fn get_premium_by_semester(
        &self,
        semester_id: &str,
        user_ids: Option<&HashSet<String>>,
    ) -> BusinessResult<Vec<PremiumAggregate>> {
        let semester = SemesterId::parse(semester_id)?;
        let aggregates = self.ctx.store().premium_by_semester(semester, user_ids).await?;

        debug!(semester = %semester, users = aggregates.len(), "Premium balances aggregated");
        Ok(aggregates)
    }
}
