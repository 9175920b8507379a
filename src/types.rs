use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Elapsed days since the first date of a run (day 0 = sequence start).
/// Offsets come from calendar arithmetic, so weekly and monthly sequences
/// have gaps between consecutive rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Day(pub u64);

impl Day {
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A team reporting its own version of the shared metric.
/// Declaration order is inclusion order: table columns, divergence pairs
/// and CSV headers all follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    #[serde(alias = "finance")]
    Finance,
    #[serde(alias = "product")]
    Product,
    #[serde(alias = "marketing")]
    Marketing,
}

impl Team {
    pub const ALL: [Team; 3] = [Team::Finance, Team::Product, Team::Marketing];

    pub fn name(self) -> &'static str {
        match self {
            Team::Finance => "Finance",
            Team::Product => "Product",
            Team::Marketing => "Marketing",
        }
    }

    /// Why this team's number moves the way it does.
    pub fn perspective(self) -> &'static [&'static str] {
        match self {
            Team::Finance => &[
                "Applies strict attribution windows aligned with financial periods",
                "Includes only fully processed transactions",
                "Applies revenue recognition rules",
                "Adjusts for returns, refunds and chargebacks",
                "Aligns with external reporting requirements",
            ],
            Team::Product => &[
                "Filters out internal test accounts and beta users",
                "Counts active users rather than all registered accounts",
                "Applies product-specific segmentation",
                "Tracks feature adoption and engagement",
                "Normalizes for A/B test variations",
            ],
            Team::Marketing => &[
                "Applies marketing attribution models (first-touch, last-touch, multi-touch)",
                "Groups channels differently than other teams",
                "Includes view-through conversions",
                "Adjusts for marketing-specific seasonality",
                "Focuses on new customer acquisition",
            ],
        }
    }

    /// How the team gets from raw logs to its number: Raw Logs, Transform, Normalize.
    pub fn pipeline(self) -> &'static [PipelineStage] {
        match self {
            Team::Finance => &FINANCE_PIPELINE,
            Team::Product => &PRODUCT_PIPELINE,
            Team::Marketing => &MARKETING_PIPELINE,
        }
    }
}

/// One step from raw logs to a team's reported number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStage {
    pub label: &'static str,
    pub content: &'static str,
}

const fn stage(label: &'static str, content: &'static str) -> PipelineStage {
    PipelineStage { label, content }
}

const FINANCE_PIPELINE: [PipelineStage; 3] = [
    stage("Raw Logs", "user_id, billing_event, timestamp"),
    stage("Transform", "SELECT DISTINCT user_id FROM billing WHERE charge_amount > 0"),
    stage("Normalize", "Monthly count of paying users"),
];

const PRODUCT_PIPELINE: [PipelineStage; 3] = [
    stage("Raw Logs", "user_id, event_type, timestamp"),
    stage(
        "Transform",
        "SELECT DISTINCT user_id FROM logs WHERE event_type = 'feature_use' \
         AND timestamp >= CURRENT_DATE - INTERVAL '30 days'",
    ),
    stage("Normalize", "Monthly count of distinct users using product features"),
];

const MARKETING_PIPELINE: [PipelineStage; 3] = [
    stage("Raw Logs", "user_id, campaign_id, event_type"),
    stage("Transform", "SELECT DISTINCT user_id FROM campaign_events WHERE event_type IN ('click', 'open')"),
    stage("Normalize", "Monthly count of users responding to campaigns"),
];

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Team {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Team::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownTeam(s.to_string()))
    }
}

/// Spacing between consecutive dates of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(alias = "daily")]
    Daily,
    #[serde(alias = "weekly")]
    Weekly,
    #[serde(alias = "monthly")]
    Monthly,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
        })
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(ConfigError::UnknownGranularity(s.to_string())),
        }
    }
}
