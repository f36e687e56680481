//! Semester inspection

use anyhow::Result;
use britewallet_business::WalletConfig;
use britewallet_core::{SemesterId, SemesterWindow};
use chrono::Utc;

use super::print_json;
use crate::SemesterAction;

pub fn handle(action: SemesterAction, config: &WalletConfig, json: bool) -> Result<()> {
    let now = Utc::now();

    let windows = match action {
        SemesterAction::Show { id } => vec![SemesterWindow::parse(&id)?],
        SemesterAction::Current => vec![SemesterWindow::current(now)?],
        SemesterAction::Prev { id } => {
            let current = id.as_deref().map(SemesterId::parse).transpose()?;
            vec![SemesterWindow::previous(current, now)?]
        }
        SemesterAction::LastExpired => {
            vec![SemesterWindow::last_expired(now, config.last_expired_max_steps)?]
        }
        SemesterAction::Valid { years } => {
            SemesterWindow::past_valid_semesters(now, years.unwrap_or(config.past_valid_years))?
        }
    };

    if json {
        return print_json(&windows);
    }

    if windows.is_empty() {
        println!("No semesters found");
    }
    for window in &windows {
        print_window(window);
    }
    Ok(())
}

fn print_window(window: &SemesterWindow) {
    let premium = &window.wallet_premium;
    let format = "%Y-%m-%d %H:%M:%S%.3f";

    println!("📅 Semester {}", window.id);
    println!("   Usable:          {} → {}", window.usable_from.format(format), window.usable_until.format(format));
    println!("   Wallet Premium:  {} → {}", premium.usable_from.format(format), premium.usable_until.format(format));

    let now = Utc::now();
    match premium.month_at(now) {
        Some((index, month)) => println!(
            "   Open month:      {}/{} until {}",
            index + 1,
            premium.by_month_usability.len(),
            month.usable_until.format(format)
        ),
        None => println!("   Open month:      none"),
    }
    println!();
}
