//! # Semester Module
//!
//! Semester identifiers (`YYYY_1` / `YYYY_2`) and the date windows derived
//! from them:
//!
//! - the 12-month usability period of ordinary deposits, which starts six
//!   months after the half begins;
//! - the 24-month Wallet Premium period that follows it;
//! - the 24 monthly withdrawal windows (day 16 to day 15 of the next month).
//!
//! Everything here is a pure function of the identifier and, where a
//! "now" is involved, of the instant passed in by the caller.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of monthly withdrawal windows in a Wallet Premium schedule.
pub const WALLET_PREMIUM_MONTHS: u32 = 24;

/// First day of a monthly window.
pub const WINDOW_START_DAY: u32 = 16;

/// Last day of a monthly window (in the following month).
pub const WINDOW_END_DAY: u32 = 15;

/// Default bound for [`SemesterWindow::last_expired`].
pub const LAST_EXPIRED_MAX_STEPS: usize = 10;

/// Default look-back for [`SemesterWindow::past_valid_semesters`].
pub const DEFAULT_PAST_VALID_YEARS: i32 = 4;

/// Half of the year a semester covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Half {
    /// January - June
    First,
    /// July - December
    Second,
}

impl Half {
    pub fn as_u8(&self) -> u8 {
        match self {
            Half::First => 1,
            Half::Second => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Half::First),
            2 => Some(Half::Second),
            _ => None,
        }
    }

    /// Month in which the half begins
    pub fn base_month(&self) -> u32 {
        match self {
            Half::First => 1,
            Half::Second => 7,
        }
    }
}

/// Semester identifier, e.g. `2022_2`.
///
/// Ordering is chronological.
///
/// # Examples
/// ```
/// use britewallet_core::SemesterId;
///
/// let id = SemesterId::parse("2020_1").unwrap();
/// assert_eq!(id.prev().to_string(), "2019_2");
/// assert!(SemesterId::parse("2020-1").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemesterId {
    year: i32,
    half: Half,
}

impl SemesterId {
    pub fn new(year: i32, half: Half) -> Self {
        Self { year, half }
    }

    /// Parse an identifier matching `^\d{4}_[12]$`
    pub fn parse(s: &str) -> CoreResult<Self> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 6
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[4] == b'_'
            && matches!(bytes[5], b'1' | b'2');

        if !well_formed {
            return Err(CoreError::InvalidSemesterFormat(s.to_string()));
        }

        let year = s[..4]
            .parse::<i32>()
            .map_err(|_| CoreError::InvalidSemesterFormat(s.to_string()))?;
        let half = if bytes[5] == b'1' {
            Half::First
        } else {
            Half::Second
        };

        Ok(Self { year, half })
    }

    /// Semester containing the given instant
    pub fn containing(at: DateTime<Utc>) -> Self {
        let half = if at.month() < 7 {
            Half::First
        } else {
            Half::Second
        };
        Self {
            year: at.year(),
            half,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn half(&self) -> Half {
        self.half
    }

    /// Previous semester: `Y_1 -> (Y-1)_2`, `Y_2 -> Y_1`
    pub fn prev(&self) -> Self {
        match self.half {
            Half::First => Self::new(self.year - 1, Half::Second),
            Half::Second => Self::new(self.year, Half::First),
        }
    }

    /// Next semester: `Y_1 -> Y_2`, `Y_2 -> (Y+1)_1`
    pub fn next(&self) -> Self {
        match self.half {
            Half::First => Self::new(self.year, Half::Second),
            Half::Second => Self::new(self.year + 1, Half::First),
        }
    }

    /// Derive all windows for this semester
    pub fn window(&self) -> CoreResult<SemesterWindow> {
        SemesterWindow::from_id(*self)
    }
}

impl fmt::Display for SemesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}_{}", self.year, self.half.as_u8())
    }
}

impl FromStr for SemesterId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemesterId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemesterId> for String {
    fn from(id: SemesterId) -> Self {
        id.to_string()
    }
}

/// One monthly withdrawal window: day 16 00:00 to day 15 23:59:59.999 of
/// the following month. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthWindow {
    pub usable_from: DateTime<Utc>,
    pub usable_until: DateTime<Utc>,
}

impl MonthWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.usable_from <= at && at <= self.usable_until
    }
}

/// The 24-month Wallet Premium period of a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumWindow {
    pub usable_from: DateTime<Utc>,
    pub usable_until: DateTime<Utc>,
    pub by_month_usability: Vec<MonthWindow>,
}

impl PremiumWindow {
    /// Monthly window containing `at`, with its index
    pub fn month_at(&self, at: DateTime<Utc>) -> Option<(usize, &MonthWindow)> {
        self.by_month_usability
            .iter()
            .enumerate()
            .find(|(_, window)| window.contains(at))
    }
}

/// All windows derived from a [`SemesterId`]. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterWindow {
    pub id: SemesterId,
    pub usable_from: DateTime<Utc>,
    pub usable_until: DateTime<Utc>,
    pub wallet_premium: PremiumWindow,
}

impl SemesterWindow {
    /// Parse a semester identifier and derive its windows
    pub fn parse(s: &str) -> CoreResult<Self> {
        Self::from_id(SemesterId::parse(s)?)
    }

    /// Derive the windows of an already-parsed identifier
    pub fn from_id(id: SemesterId) -> CoreResult<Self> {
        let base = ymd(id.year, id.half.base_month(), 1)?;

        // Ordinary deposits are usable for 12 months, starting 6 months
        // after the half begins.
        let usable_from_date = month_day(base, 6, 1)?;
        let usable_from = start_of_day(usable_from_date);
        let usable_until = start_of_day(month_day(usable_from_date, 12, 1)?) - Duration::milliseconds(1);

        // First day of the month that follows usable_until
        let premium_base = month_day(usable_from_date, 12, 1)?;

        let wp_from = start_of_day(month_day(premium_base, 0, WINDOW_START_DAY)?);
        let wp_until = end_of_day(month_day(
            premium_base,
            WALLET_PREMIUM_MONTHS,
            WINDOW_END_DAY,
        )?);

        let mut by_month_usability = Vec::with_capacity(WALLET_PREMIUM_MONTHS as usize);
        for i in 0..WALLET_PREMIUM_MONTHS {
            by_month_usability.push(MonthWindow {
                usable_from: start_of_day(month_day(premium_base, i, WINDOW_START_DAY)?),
                usable_until: end_of_day(month_day(premium_base, i + 1, WINDOW_END_DAY)?),
            });
        }

        Ok(Self {
            id,
            usable_from,
            usable_until,
            wallet_premium: PremiumWindow {
                usable_from: wp_from,
                usable_until: wp_until,
                by_month_usability,
            },
        })
    }

    pub fn year(&self) -> i32 {
        self.id.year
    }

    pub fn half(&self) -> Half {
        self.id.half
    }

    /// `usable_until` is in the past
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.usable_until < now
    }

    /// Semester containing `now`
    pub fn current(now: DateTime<Utc>) -> CoreResult<Self> {
        SemesterId::containing(now).window()
    }

    /// Semester preceding `current`, or preceding the semester containing
    /// `now` when no current one is given
    pub fn previous(current: Option<SemesterId>, now: DateTime<Utc>) -> CoreResult<Self> {
        current
            .unwrap_or_else(|| SemesterId::containing(now))
            .prev()
            .window()
    }

    /// Walk backward from the previous semester until an expired one is
    /// found, at most `max_steps` semesters.
    ///
    /// Fails with [`CoreError::NoExpiredSemester`] when the bound is hit.
    pub fn last_expired(now: DateTime<Utc>, max_steps: usize) -> CoreResult<Self> {
        let mut candidate = SemesterId::containing(now).prev();

        for _ in 0..max_steps {
            let window = candidate.window()?;
            if window.is_expired(now) {
                return Ok(window);
            }
            candidate = candidate.prev();
        }

        Err(CoreError::NoExpiredSemester { steps: max_steps })
    }

    /// Semesters from `now.year - past_years` to `now.year` whose Wallet
    /// Premium period has started and has not fully elapsed
    pub fn past_valid_semesters(now: DateTime<Utc>, past_years: i32) -> CoreResult<Vec<Self>> {
        let mut semesters = Vec::new();

        for year in (now.year() - past_years)..=now.year() {
            for half in [Half::First, Half::Second] {
                let window = SemesterId::new(year, half).window()?;
                let premium = &window.wallet_premium;
                if premium.usable_from <= now && now <= premium.usable_until {
                    semesters.push(window);
                }
            }
        }

        Ok(semesters)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> CoreResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| CoreError::DateOutOfRange(format!("{:04}-{:02}-{:02}", year, month, day)))
}

/// `anchor` moved forward by `months`, then forced to `day`
fn month_day(anchor: NaiveDate, months: u32, day: u32) -> CoreResult<NaiveDate> {
    let total = anchor.year() * 12 + anchor.month0() as i32 + months as i32;
    ymd(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, day)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
}
