use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{Day, Team};

/// A permanent change to one team's metric definition, effective from `day`
/// (inclusive) for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub day: Day,
    pub team: Team,
    /// Always contains the owning team's name; per-team filtering matches on it.
    pub description: String,
}

impl DriftEvent {
    fn new(day: Day, team: Team, what: &str) -> Self {
        DriftEvent { day, team, description: format!("{} team {what}", team.name()) }
    }

    /// Substring match on the team name, the same rule consumers use to
    /// filter annotations.
    pub fn affects(&self, team: Team) -> bool {
        self.description.contains(team.name())
    }

    pub fn is_active(&self, day: Day) -> bool {
        day >= self.day
    }

    pub fn date(&self, start: NaiveDate) -> NaiveDate {
        start + Duration::days(self.day.0 as i64)
    }
}

/// Schedule rule for one team's definition change: the event exists once
/// the run reaches `min_horizon` days and fires at
/// `min(cap, max_day * numer / denom)`.
struct EventRule {
    team: Team,
    min_horizon: u64,
    cap: u64,
    numer: u64,
    denom: u64,
    what: &'static str,
}

const EVENT_RULES: [EventRule; 3] = [
    EventRule {
        team: Team::Finance,
        min_horizon: 30,
        cap: 30,
        numer: 1,
        denom: 3,
        what: "adds attribution window adjustment",
    },
    EventRule {
        team: Team::Product,
        min_horizon: 60,
        cap: 60,
        numer: 1,
        denom: 2,
        what: "filters out test accounts",
    },
    EventRule {
        team: Team::Marketing,
        min_horizon: 90,
        cap: 90,
        numer: 2,
        denom: 3,
        what: "changes channel grouping logic",
    },
];

/// Definition-change events for a run whose last row sits at `max_day`.
/// A pure function of the horizon: equal horizons give equal event lists.
pub fn derive_events(max_day: Day) -> Vec<DriftEvent> {
    EVENT_RULES
        .iter()
        .filter(|rule| max_day.0 >= rule.min_horizon)
        .map(|rule| {
            let day = rule.cap.min(max_day.0.saturating_mul(rule.numer) / rule.denom);
            DriftEvent::new(Day(day), rule.team, rule.what)
        })
        .collect()
}

pub fn events_for(events: &[DriftEvent], team: Team) -> impl Iterator<Item = &DriftEvent> {
    events.iter().filter(move |e| e.affects(team))
}

/// An event placed on the calendar for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAnnotation {
    pub day: Day,
    pub date: NaiveDate,
    pub description: String,
}

/// Calendar annotations for the events that fall inside the run.
pub fn annotate(events: &[DriftEvent], start: NaiveDate, max_day: Day) -> Vec<EventAnnotation> {
    events
        .iter()
        .filter(|e| e.day <= max_day)
        .map(|e| EventAnnotation { day: e.day, date: e.date(start), description: e.description.clone() })
        .collect()
}
