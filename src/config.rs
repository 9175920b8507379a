use std::ops::RangeInclusive;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dates::generate_dates;
use crate::error::ConfigError;
use crate::types::{Granularity, Team};

pub const BASE_DRIFT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
pub const CONTEXT_FACTOR_RANGE: RangeInclusive<f64> = 0.0..=2.0;
pub const SEASONALITY_RANGE: RangeInclusive<f64> = 0.0..=1.0;
pub const NOISE_LEVEL_RANGE: RangeInclusive<f64> = 0.0..=0.5;
pub const TEAM_WEIGHT_RANGE: RangeInclusive<f64> = 0.5..=1.5;

/// Default look-back when no start date is given.
pub const DEFAULT_SPAN_DAYS: i64 = 90;

/// Which teams get a column in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSelection {
    pub finance: bool,
    pub product: bool,
    pub marketing: bool,
}

impl TeamSelection {
    pub fn all() -> Self {
        TeamSelection { finance: true, product: true, marketing: true }
    }

    pub fn none() -> Self {
        TeamSelection { finance: false, product: false, marketing: false }
    }

    pub fn only(team: Team) -> Self {
        let mut s = Self::none();
        s.set(team, true);
        s
    }

    pub fn contains(&self, team: Team) -> bool {
        match team {
            Team::Finance => self.finance,
            Team::Product => self.product,
            Team::Marketing => self.marketing,
        }
    }

    pub fn set(&mut self, team: Team, enabled: bool) {
        match team {
            Team::Finance => self.finance = enabled,
            Team::Product => self.product = enabled,
            Team::Marketing => self.marketing = enabled,
        }
    }

    /// Enabled teams in inclusion order.
    pub fn enabled(&self) -> Vec<Team> {
        Team::ALL.into_iter().filter(|t| self.contains(*t)).collect()
    }
}

impl FromIterator<Team> for TeamSelection {
    fn from_iter<I: IntoIterator<Item = Team>>(iter: I) -> Self {
        let mut s = Self::none();
        for team in iter {
            s.set(team, true);
        }
        s
    }
}

/// Coefficients of the drift model. The generator trusts these; range
/// checks live in [`SimulationConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftParams {
    /// How fast each team's definition moves away from the base, per day.
    pub base_drift: f64,
    /// How strongly team context reshapes the base metric.
    pub context_factor: f64,
    pub seasonality: f64,
    pub noise_level: f64,
    pub finance_weight: f64,
    pub product_weight: f64,
    pub marketing_weight: f64,
    pub teams: TeamSelection,
}

impl DriftParams {
    pub fn canonical() -> Self {
        DriftParams {
            base_drift: 0.2,
            context_factor: 1.0,
            seasonality: 0.3,
            noise_level: 0.1,
            finance_weight: 1.2,
            product_weight: 0.8,
            marketing_weight: 1.0,
            teams: TeamSelection::all(),
        }
    }

    pub fn weight(&self, team: Team) -> f64 {
        match team {
            Team::Finance => self.finance_weight,
            Team::Product => self.product_weight,
            Team::Marketing => self.marketing_weight,
        }
    }

    pub fn set_weight(&mut self, team: Team, weight: f64) {
        match team {
            Team::Finance => self.finance_weight = weight,
            Team::Product => self.product_weight = weight,
            Team::Marketing => self.marketing_weight = weight,
        }
    }
}

/// Everything one run needs. Built once, never mutated while a run is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// `None` draws a fresh seed per run (noise differs between runs).
    pub seed: Option<u64>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub params: DriftParams,
}

impl SimulationConfig {
    /// The 90 days up to `end`, weekly, all teams, unseeded.
    pub fn canonical_ending(end: NaiveDate) -> Self {
        SimulationConfig {
            seed: None,
            start: end - Duration::days(DEFAULT_SPAN_DAYS),
            end,
            granularity: Granularity::Weekly,
            params: DriftParams::canonical(),
        }
    }

    /// Check every coefficient against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end < self.start {
            return Err(ConfigError::EndBeforeStart { start: self.start, end: self.end });
        }
        let p = &self.params;
        check_range("base_drift", p.base_drift, &BASE_DRIFT_RANGE)?;
        check_range("context_factor", p.context_factor, &CONTEXT_FACTOR_RANGE)?;
        check_range("seasonality", p.seasonality, &SEASONALITY_RANGE)?;
        check_range("noise_level", p.noise_level, &NOISE_LEVEL_RANGE)?;
        check_range("finance_weight", p.finance_weight, &TEAM_WEIGHT_RANGE)?;
        check_range("product_weight", p.product_weight, &TEAM_WEIGHT_RANGE)?;
        check_range("marketing_weight", p.marketing_weight, &TEAM_WEIGHT_RANGE)?;
        Ok(())
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        generate_dates(self.start, self.end, self.granularity)
    }

    /// The configured seed, or a fresh one from the thread RNG.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::rng().random())
    }
}

fn check_range(field: &'static str, value: f64, range: &RangeInclusive<f64>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, min: *range.start(), max: *range.end() })
    }
}

/// Partial overrides read from a TOML file. Absent keys keep the current value.
///
/// ```toml
/// seed = 7
/// start = "2024-01-01"
/// end = "2024-06-30"
/// granularity = "daily"
/// teams = ["finance", "marketing"]
/// noise_level = 0.0
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub seed: Option<u64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub granularity: Option<Granularity>,
    pub teams: Option<Vec<Team>>,
    pub base_drift: Option<f64>,
    pub context_factor: Option<f64>,
    pub seasonality: Option<f64>,
    pub noise_level: Option<f64>,
    pub finance_weight: Option<f64>,
    pub product_weight: Option<f64>,
    pub marketing_weight: Option<f64>,
}

impl ConfigFile {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    /// Layer `over` on top of `self`: keys set in `over` win.
    pub fn merged(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            seed: over.seed.or(self.seed),
            start: over.start.or(self.start),
            end: over.end.or(self.end),
            granularity: over.granularity.or(self.granularity),
            teams: over.teams.or(self.teams),
            base_drift: over.base_drift.or(self.base_drift),
            context_factor: over.context_factor.or(self.context_factor),
            seasonality: over.seasonality.or(self.seasonality),
            noise_level: over.noise_level.or(self.noise_level),
            finance_weight: over.finance_weight.or(self.finance_weight),
            product_weight: over.product_weight.or(self.product_weight),
            marketing_weight: over.marketing_weight.or(self.marketing_weight),
        }
    }

    /// Build the run config. `end` defaults to `today`; `start` defaults to
    /// [`DEFAULT_SPAN_DAYS`] before whichever end was chosen.
    pub fn resolve(self, today: NaiveDate) -> SimulationConfig {
        let mut config = SimulationConfig::canonical_ending(self.end.unwrap_or(today));
        self.apply(&mut config);
        config
    }

    pub fn apply(self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(end) = self.end {
            config.end = end;
        }
        if let Some(g) = self.granularity {
            config.granularity = g;
        }
        if let Some(teams) = self.teams {
            config.params.teams = teams.into_iter().collect();
        }
        let p = &mut config.params;
        for (slot, value) in [
            (&mut p.base_drift, self.base_drift),
            (&mut p.context_factor, self.context_factor),
            (&mut p.seasonality, self.seasonality),
            (&mut p.noise_level, self.noise_level),
            (&mut p.finance_weight, self.finance_weight),
            (&mut p.product_weight, self.product_weight),
            (&mut p.marketing_weight, self.marketing_weight),
        ] {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}
