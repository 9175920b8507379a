use std::collections::BTreeMap;
use std::f64::consts::TAU;

use chrono::NaiveDate;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use tracing::debug;

use crate::config::{DriftParams, SimulationConfig};
use crate::dates::date_points;
use crate::events::{DriftEvent, derive_events};
use crate::types::{Day, Team};

/// Base metric level at day 0.
pub const BASE_LEVEL: f64 = 100.0;
/// Linear growth of the base metric per elapsed day.
pub const BASE_GROWTH_PER_DAY: f64 = 0.05;
const YEARLY_AMPLITUDE: f64 = 10.0;
const WEEKLY_AMPLITUDE: f64 = 5.0;

/// The shared, team-independent signal at day `t`.
pub fn base_metric(t: f64, seasonality: f64) -> f64 {
    let mut base = BASE_LEVEL + BASE_GROWTH_PER_DAY * t;
    if seasonality > 0.0 {
        let yearly = (TAU * t / 365.0).sin() * YEARLY_AMPLITUDE * seasonality;
        let weekly = (TAU * t / 7.0).sin() * WEEKLY_AMPLITUDE * seasonality;
        base += yearly + weekly;
    }
    base
}

/// How one team reshapes the base signal.
///
/// `value = base·(1 + context_lift·cf·w) + drift_sign·drift + noise`, where
/// `drift = base_drift·t·drift_rate·w + Σ step·cf·w` over the team's active events
/// and `noise ~ N(0, base·noise_level·noise_scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamModel {
    pub drift_rate: f64,
    /// −1 pulls the reported value down as drift accumulates, +1 pushes it up.
    pub drift_sign: f64,
    /// Added to the drift accumulator once per active event.
    pub event_step: f64,
    pub context_lift: f64,
    pub noise_scale: f64,
}

impl TeamModel {
    pub fn for_team(team: Team) -> Self {
        match team {
            // Conservative: recognized revenue only.
            Team::Finance => TeamModel {
                drift_rate: 0.15,
                drift_sign: -1.0,
                event_step: 5.0,
                context_lift: 0.1,
                noise_scale: 0.5,
            },
            // Filtering test accounts shrinks the accumulator, lifting the value.
            Team::Product => TeamModel {
                drift_rate: 0.2,
                drift_sign: -1.0,
                event_step: -8.0,
                context_lift: -0.05,
                noise_scale: 0.7,
            },
            // Inflationary: attribution changes only ever add.
            Team::Marketing => TeamModel {
                drift_rate: 0.25,
                drift_sign: 1.0,
                event_step: 12.0,
                context_lift: 0.15,
                noise_scale: 1.0,
            },
        }
    }
}

/// One output row. `values` holds exactly the enabled teams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub day: Day,
    #[serde(flatten)]
    pub values: BTreeMap<Team, f64>,
}

impl MetricRow {
    pub fn value(&self, team: Team) -> Option<f64> {
        self.values.get(&team).copied()
    }
}

/// Rows in date order plus the teams that own a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTable {
    pub teams: Vec<Team>,
    pub rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_day(&self) -> Day {
        self.rows.last().map(|r| r.day).unwrap_or_default()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    /// One team's series, or `None` if the team was not enabled.
    pub fn column(&self, team: Team) -> Option<Vec<f64>> {
        if !self.teams.contains(&team) {
            return None;
        }
        self.rows.iter().map(|r| r.value(team)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub table: MetricTable,
    pub events: Vec<DriftEvent>,
}

/// Run the drift model over `dates`.
///
/// Noise takes one standard-normal draw per row per enabled team, in
/// inclusion order, so a seeded `rng` reproduces the run exactly. With
/// `noise_level = 0` the output does not depend on `rng` at all.
pub fn simulate(dates: &[NaiveDate], params: &DriftParams, rng: &mut impl Rng) -> SimulationOutput {
    let points = date_points(dates);
    let max_day = points.last().map(|p| p.day).unwrap_or_default();
    let events = derive_events(max_day);
    let teams = params.teams.enabled();

    let mut rows = Vec::with_capacity(points.len());
    for point in &points {
        let base = base_metric(point.day.as_f64(), params.seasonality);
        let mut values = BTreeMap::new();
        for &team in &teams {
            let z: f64 = rng.sample(StandardNormal);
            values.insert(team, team_value(team, point.day, base, params, &events, z));
        }
        rows.push(MetricRow { date: point.date, day: point.day, values });
    }

    debug!(rows = rows.len(), events = events.len(), max_day = max_day.0, "simulation complete");
    SimulationOutput { table: MetricTable { teams, rows }, events }
}

/// Generate the config's dates and simulate them with a ChaCha20 stream seeded from `seed`.
pub fn run_seeded(config: &SimulationConfig, seed: u64) -> SimulationOutput {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    simulate(&config.dates(), &config.params, &mut rng)
}

/// One team's reported value at `day`, clamped to be non-negative.
/// `z` is a standard-normal draw.
fn team_value(team: Team, day: Day, base: f64, params: &DriftParams, events: &[DriftEvent], z: f64) -> f64 {
    let model = TeamModel::for_team(team);
    let weight = params.weight(team);
    let context = params.context_factor * weight;

    let mut drift = params.base_drift * day.as_f64() * model.drift_rate * weight;
    for event in events {
        if event.is_active(day) && event.affects(team) {
            drift += model.event_step * context;
        }
    }

    let noise = base * params.noise_level * model.noise_scale * z;
    let value = base * (1.0 + model.context_lift * context) + model.drift_sign * drift + noise;
    value.max(0.0)
}
