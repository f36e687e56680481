//! Wallet Premium operations: switch, worker, withdrawals, summaries

use anyhow::{Context, Result};
use britewallet_business::{
    ProvisioningWorker, RecapitalizationService, SemesterSummary, ServiceContext, SummaryService,
    WithdrawalService,
};
use britewallet_core::WpMovement;
use britewallet_persistence::Database;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::info;

use super::print_json;
use crate::{SummaryAction, SwitchAction, WpAction};

/// Enqueue the provisioning tasks of an expired semester
pub async fn switch(ctx: &ServiceContext, action: SwitchAction, json: bool) -> Result<()> {
    let service = RecapitalizationService::new(ctx);

    let report = match action {
        SwitchAction::Semester { id, users } => {
            let users: Option<HashSet<String>> = users.map(|u| u.into_iter().collect());
            service.trigger_end_semester_switch(&id, users.as_ref()).await?
        }
        SwitchAction::Last => service.trigger_last_expired_switch().await?,
    };

    if json {
        return print_json(&report);
    }
    println!("🔁 Semester {} switched", report.semester);
    println!("   Usable from:  {}", report.usable_from);
    println!("   Expired at:   {}", report.expired_at);
    println!("   Tasks:        {}", report.count);
    for user in &report.users {
        println!("     • {}", user);
    }
    Ok(())
}

/// Take everything on the provisioning queue and run it
pub async fn work(ctx: &ServiceContext, database: &Database, json: bool) -> Result<()> {
    let queue_name = &ctx.config().provisioning_queue;
    let tasks = database
        .queue()
        .take_pending(queue_name)
        .with_context(|| format!("Failed to read queue {}", queue_name))?;
    info!(queue = %queue_name, count = tasks.len(), "Draining provisioning queue");

    let report = ProvisioningWorker::new(ctx).drain(tasks).await;
    database
        .queue()
        .complete_taken(queue_name)
        .with_context(|| format!("Failed to clear taken tasks of {}", queue_name))?;

    if json {
        return print_json(&report);
    }
    println!("⚙️  Worker finished");
    println!("   Provisioned:  {}", report.provisioned.len());
    for outcome in &report.provisioned {
        println!(
            "     • {} {} {:?} ({} records)",
            outcome.user_id,
            outcome.semester,
            outcome.status,
            outcome.movement_ids.len()
        );
    }
    println!("   Forwarded:    {}", report.forwarded);
    println!("   Requeued:     {}", report.requeued.len());
    println!("   Failed:       {}", report.failed.len());
    Ok(())
}

pub async fn withdraw(
    ctx: &ServiceContext,
    wp_movement_id: &str,
    amount: Decimal,
    user_id: &str,
    card: Option<&str>,
    json: bool,
) -> Result<()> {
    let updated = WithdrawalService::new(ctx)
        .withdraw_by_id(wp_movement_id, amount, user_id, card)
        .await?;

    if json {
        return print_json(&updated);
    }
    println!("✅ Withdrawal successful!");
    print_wp_movement(&updated);
    Ok(())
}

pub async fn withdraw_semester(
    ctx: &ServiceContext,
    amount: Decimal,
    user_id: &str,
    semesters: &[String],
    target: Option<&str>,
    card: Option<&str>,
    json: bool,
) -> Result<()> {
    let acting = ctx
        .store()
        .find_user(user_id)
        .await?
        .with_context(|| format!("User not found: {}", user_id))?;

    let updated = WithdrawalService::new(ctx)
        .withdraw_by_semester(&acting, target, semesters, amount, card)
        .await?;

    if json {
        return print_json(&updated);
    }
    println!("✅ Withdrew {} brites from {} records", amount, updated.len());
    for movement in &updated {
        print_wp_movement(movement);
    }
    Ok(())
}

pub async fn summary(ctx: &ServiceContext, action: SummaryAction, json: bool) -> Result<()> {
    let service = SummaryService::new(ctx);

    match action {
        SummaryAction::Semester { id, user, movements } => {
            let summary = service.get_semester_summary(&id, &user, movements).await?;
            if json {
                return print_json(&summary);
            }
            print_summary(&summary);
            if let Some(movements) = &summary.movements {
                for movement in movements {
                    print_wp_movement(movement);
                }
            }
        }
        SummaryAction::User { id } => {
            let summaries = service.get_user_summary(&id).await?;
            if json {
                return print_json(&summaries);
            }
            if summaries.is_empty() {
                println!("No Wallet Premium running for {}", id);
            }
            for summary in &summaries {
                print_summary(summary);
            }
        }
    }
    Ok(())
}

pub async fn wp(ctx: &ServiceContext, action: WpAction, json: bool) -> Result<()> {
    match action {
        WpAction::Show { id } => {
            let movement = SummaryService::new(ctx).find_wp_movement(&id).await?;
            if json {
                return print_json(&movement);
            }
            print_wp_movement(&movement);
            if let Some(income) = movement.income() {
                for entry in &income.withdrawal_movements {
                    println!(
                        "     ↳ {} {} {}",
                        entry.amount_change,
                        entry.movement_type.as_str(),
                        entry.notes.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

pub async fn notify_unlock(ctx: &ServiceContext, users: Option<Vec<String>>, json: bool) -> Result<()> {
    let service = RecapitalizationService::new(ctx);
    let users = match users {
        Some(users) => users,
        None => service.pending_unlock_users().await?,
    };

    let report = service.notify_before_recapitalization(&users).await?;

    if json {
        return print_json(&report);
    }
    println!("🔔 Unlock reminders");
    println!("   Sent:    {}", report.success.len());
    println!("   Failed:  {}", report.failed.len());
    Ok(())
}

fn print_summary(summary: &SemesterSummary) {
    println!("💰 Semester {}", summary.semester_details.id);
    println!("   Initial amount:        {}", summary.initial_amount);
    println!("   Earned per month:      {}", summary.earned);
    println!("   Withdrawn this month:  {}", summary.withdrawn);
    println!("   Withdrawable now:      {}", summary.withdrawable);
    println!("   No more withdrawable:  {}", summary.no_more_withdrawable);
    println!("   Remaining to withdraw: {}", summary.remaining_to_withdraw);
    println!();
}

fn print_wp_movement(movement: &WpMovement) {
    match movement.income() {
        Some(income) => println!(
            "   {}  {} → {}  remaining {}/{}",
            movement.id,
            income.withdrawable_from.format("%Y-%m-%d"),
            income.withdrawable_until.format("%Y-%m-%d"),
            income.withdrawal_remaining,
            income.income_amount
        ),
        None => println!(
            "   {}  initial deposit {} ({})",
            movement.id, movement.initial_amount, movement.semester
        ),
    }
}
