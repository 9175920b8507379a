use chrono::{Duration, NaiveDate};

use metric_drift::config::{DriftParams, TeamSelection};
use metric_drift::dates::generate_dates;
use metric_drift::types::Granularity;

pub struct Scenario {
    pub days: i64,
    pub granularity: Granularity,
}

/// One quarter of daily rows, the demo's default window.
pub const SMALL: Scenario = Scenario { days: 90, granularity: Granularity::Daily };

/// Three years of daily rows.
pub const MEDIUM: Scenario = Scenario { days: 3 * 365, granularity: Granularity::Daily };

/// Twenty years of daily rows, well past anything a chart would show.
pub const LARGE: Scenario = Scenario { days: 20 * 365, granularity: Granularity::Daily };

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
}

pub fn dates_for(scenario: &Scenario) -> Vec<NaiveDate> {
    generate_dates(start(), start() + Duration::days(scenario.days - 1), scenario.granularity)
}

pub fn params(teams: TeamSelection) -> DriftParams {
    DriftParams { teams, ..DriftParams::canonical() }
}
