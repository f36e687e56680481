//! Net premium-eligible balance per user per semester.
//!
//! [`aggregate_premium`] is the single definition of the IN/OUT fold; every
//! store runs its snapshot of ledger entries through it.

use crate::brites::round_brites;
use crate::movement::Movement;
use crate::semester::SemesterId;
use crate::user::ClubPack;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Derived, never persisted. Only materialized when `remaining_amount > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumAggregate {
    pub user_id: String,
    pub in_amount: Decimal,
    pub out_amount: Decimal,
    /// `round(in_amount - out_amount)`
    pub remaining_amount: Decimal,
    pub semester: SemesterId,
}

/// Group Premium entries of `semester` by user and net IN against OUT.
///
/// Entries of another semester or another pack, and users outside
/// `user_ids` when given, are ignored. Users whose rounded remainder is
/// not positive are dropped. Output is ordered by user id.
pub fn aggregate_premium<'a, I>(
    entries: I,
    semester: SemesterId,
    user_ids: Option<&HashSet<String>>,
) -> Vec<PremiumAggregate>
where
    I: IntoIterator<Item = &'a Movement>,
{
    let mut groups: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();

    for entry in entries {
        if entry.club_pack != ClubPack::Premium || entry.semester_id != semester {
            continue;
        }
        if let Some(ids) = user_ids {
            if !ids.contains(&entry.user_id) {
                continue;
            }
        }

        let totals = groups
            .entry(entry.user_id.as_str())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        if entry.movement_type.is_in() {
            totals.0 += entry.amount_change;
        } else if entry.movement_type.is_out() {
            totals.1 += entry.amount_change;
        }
    }

    groups
        .into_iter()
        .filter_map(|(user_id, (in_amount, out_amount))| {
            let remaining_amount = round_brites(in_amount - out_amount);
            (remaining_amount > Decimal::ZERO).then(|| PremiumAggregate {
                user_id: user_id.to_string(),
                in_amount,
                out_amount,
                remaining_amount,
                semester,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementType;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn entry(user: &str, amount: Decimal, kind: MovementType, semester: &str, pack: ClubPack) -> Movement {
        Movement::new(
            user,
            amount,
            kind,
            SemesterId::parse(semester).unwrap(),
            pack,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_nets_in_against_out() {
        let semester = SemesterId::parse("2023_1").unwrap();
        let entries = vec![
            entry("alice", dec!(1000), MovementType::DepositAdded, "2023_1", ClubPack::Premium),
            entry("alice", dec!(200.4), MovementType::InterestRecapitalized, "2023_1", ClubPack::Premium),
            entry("alice", dec!(150), MovementType::DepositUsed, "2023_1", ClubPack::Premium),
            entry("alice", dec!(50), MovementType::DepositTransferred, "2023_1", ClubPack::Premium),
            // ignored: Wallet Premium unlocks are neither IN nor OUT
            entry("alice", dec!(999), MovementType::DepositUnlockedWp, "2023_1", ClubPack::Premium),
            entry("bob", dec!(100), MovementType::DepositAdded, "2023_1", ClubPack::Premium),
            entry("bob", dec!(100), MovementType::DepositRemoved, "2023_1", ClubPack::Premium),
            entry("carol", dec!(10), MovementType::DepositAdded, "2023_1", ClubPack::Premium),
            entry("carol", dec!(9.6), MovementType::DepositUsed, "2023_1", ClubPack::Premium),
        ];

        let result = aggregate_premium(&entries, semester, None);

        // bob nets to 0, carol's 0.4 rounds to 0
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].user_id, "alice");
        assert_eq!(result[0].in_amount, dec!(1200.4));
        assert_eq!(result[0].out_amount, dec!(200));
        assert_eq!(result[0].remaining_amount, dec!(1000));
    }

    #[test]
    fn test_aggregate_filters_pack_semester_and_users() {
        let semester = SemesterId::parse("2023_1").unwrap();
        let entries = vec![
            entry("alice", dec!(100), MovementType::DepositAdded, "2023_1", ClubPack::Premium),
            entry("alice", dec!(500), MovementType::DepositAdded, "2022_2", ClubPack::Premium),
            entry("bob", dec!(100), MovementType::DepositAdded, "2023_1", ClubPack::Basic),
            entry("dave", dec!(70), MovementType::DepositAdded, "2023_1", ClubPack::Premium),
        ];

        let all = aggregate_premium(&entries, semester, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].remaining_amount, dec!(100));
        assert_eq!(all[1].user_id, "dave");

        let only: HashSet<String> = ["dave".to_string()].into_iter().collect();
        let filtered = aggregate_premium(&entries, semester, Some(&only));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].user_id, "dave");
        assert_eq!(filtered[0].semester, semester);
    }
}
