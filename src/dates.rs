use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::types::{Day, Granularity};

/// Monthly stepping never lands on a day-of-month past this, so every month
/// has a valid target date.
pub const MONTHLY_MAX_DAY: u32 = 28;

/// A calendar date and its elapsed-day offset from the first date of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatePoint {
    pub date: NaiveDate,
    pub day: Day,
}

/// Dates from `start` to `end` (inclusive) at the given spacing.
///
/// An `end` before `start` yields an empty sequence for every granularity.
pub fn generate_dates(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Vec<NaiveDate> {
    let delta = (end - start).num_days();
    if delta < 0 {
        return Vec::new();
    }
    match granularity {
        Granularity::Daily => (0..=delta).map(|i| start + Duration::days(i)).collect(),
        Granularity::Weekly => (0..=delta / 7).map(|i| start + Duration::days(i * 7)).collect(),
        Granularity::Monthly => {
            let mut out = Vec::new();
            let mut current = start;
            while current <= end {
                out.push(current);
                let Some(next) = next_month(current) else { break };
                current = next;
            }
            out
        }
    }
}

/// Same day next month, with the day clamped to [`MONTHLY_MAX_DAY`].
///
/// Starting on the 29th–31st therefore shifts every later date to the 28th.
/// Drift event timing depends on this, so the clamp stays.
fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, date.day().min(MONTHLY_MAX_DAY))
}

/// Pair each date with its offset from `dates[0]`.
///
/// Dates are expected in ascending order; anything earlier than the first
/// date is pinned to day 0.
pub fn date_points(dates: &[NaiveDate]) -> Vec<DatePoint> {
    let Some(&first) = dates.first() else {
        return Vec::new();
    };
    dates
        .iter()
        .map(|&date| DatePoint {
            date,
            day: Day(u64::try_from((date - first).num_days()).unwrap_or(0)),
        })
        .collect()
}
