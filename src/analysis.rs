use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::simulation::MetricTable;
use crate::types::{Day, Team};

/// Two teams compared by absolute difference, `a` before `b` in inclusion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TeamPair {
    pub a: Team,
    pub b: Team,
}

impl fmt::Display for TeamPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.a, self.b)
    }
}

impl TeamPair {
    /// How `a`'s definition differs from `b`'s, in one sentence.
    pub fn definition_gap(&self) -> &'static str {
        use Team::*;
        match (self.a, self.b) {
            (Finance, Product) => "Finance only counts paying users while Product includes all active users.",
            (Finance, Marketing) => {
                "Finance focuses on revenue-generating users while Marketing tracks campaign engagement."
            }
            (Product, Finance) => "Product tracks feature usage while Finance only counts paying customers.",
            (Product, Marketing) => {
                "Product measures actual product usage while Marketing includes campaign interactions."
            }
            (Marketing, Finance) => "Marketing includes all engaged users while Finance only counts paying customers.",
            (Marketing, Product) => {
                "Marketing includes campaign interactions while Product only counts actual feature usage."
            }
            (Finance, Finance) | (Product, Product) | (Marketing, Marketing) => "No comparison available.",
        }
    }
}

/// Every unordered pair of `teams`, preserving their order.
pub fn team_pairs(teams: &[Team]) -> Vec<TeamPair> {
    teams
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| teams[i + 1..].iter().map(move |&b| TeamPair { a, b }))
        .collect()
}

/// Pairwise absolute differences for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceRow {
    pub date: NaiveDate,
    pub day: Day,
    /// Aligned with [`DivergenceTable::pairs`].
    pub differences: Vec<f64>,
    /// Mean of `differences`.
    pub average: f64,
}

impl DivergenceRow {
    pub fn max(&self) -> f64 {
        self.differences.iter().copied().fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceTable {
    pub pairs: Vec<TeamPair>,
    pub rows: Vec<DivergenceRow>,
}

impl DivergenceTable {
    pub fn series(&self, pair: TeamPair) -> Option<Vec<f64>> {
        let idx = self.pairs.iter().position(|p| *p == pair)?;
        Some(self.rows.iter().map(|r| r.differences[idx]).collect())
    }
}

/// Divergence between every pair of enabled teams.
///
/// Returns `None` with fewer than two teams: there is nothing to compare.
pub fn divergence(table: &MetricTable) -> Option<DivergenceTable> {
    let pairs = team_pairs(&table.teams);
    if pairs.is_empty() {
        return None;
    }
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let differences: Vec<f64> = pairs
                .iter()
                .map(|p| match (row.value(p.a), row.value(p.b)) {
                    (Some(a), Some(b)) => (a - b).abs(),
                    _ => 0.0,
                })
                .collect();
            let average = differences.iter().sum::<f64>() / differences.len() as f64;
            DivergenceRow { date: row.date, day: row.day, differences, average }
        })
        .collect();
    Some(DivergenceTable { pairs, rows })
}

/// End-of-run divergence figures, each change measured against the first row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DivergenceSummary {
    pub max_divergence: f64,
    pub max_divergence_change: f64,
    pub average_divergence: f64,
    pub average_divergence_change: f64,
    /// Relative growth of the average divergence, in percent.
    pub growth_pct: f64,
}

/// Percent change from `start` to `end`; 0 when `start` is not positive.
pub fn growth_pct(start: f64, end: f64) -> f64 {
    if start > 0.0 { (end - start) / start * 100.0 } else { 0.0 }
}

pub fn summarize(div: &DivergenceTable) -> Option<DivergenceSummary> {
    let first = div.rows.first()?;
    let last = div.rows.last()?;
    Some(DivergenceSummary {
        max_divergence: last.max(),
        max_divergence_change: last.max() - first.max(),
        average_divergence: last.average,
        average_divergence_change: last.average - first.average,
        growth_pct: growth_pct(first.average, last.average),
    })
}

/// Signed percent difference of `value` from `reference`; 0 when `reference` is 0.
pub fn percent_difference(value: f64, reference: f64) -> f64 {
    if reference == 0.0 { 0.0 } else { (value - reference) / reference * 100.0 }
}

/// Signed gap between two teams on the last date of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairGap {
    pub pair: TeamPair,
    /// `a - b`.
    pub difference: f64,
    /// `a` relative to `b`, in percent.
    pub percent: f64,
}

pub fn pair_gaps(table: &MetricTable) -> Vec<PairGap> {
    let Some(last) = table.rows.last() else {
        return Vec::new();
    };
    team_pairs(&table.teams)
        .into_iter()
        .filter_map(|pair| {
            let a = last.value(pair.a)?;
            let b = last.value(pair.b)?;
            Some(PairGap { pair, difference: a - b, percent: percent_difference(a, b) })
        })
        .collect()
}

/// First/last/mean of one team's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamTrend {
    pub team: Team,
    pub first: f64,
    pub last: f64,
    pub mean: f64,
}

impl TeamTrend {
    pub fn change(&self) -> f64 {
        self.last - self.first
    }
}

pub fn team_trends(table: &MetricTable) -> Vec<TeamTrend> {
    table
        .teams
        .iter()
        .filter_map(|&team| {
            let series = table.column(team)?;
            let first = *series.first()?;
            let last = *series.last()?;
            let mean = series.iter().sum::<f64>() / series.len() as f64;
            Some(TeamTrend { team, first, last, mean })
        })
        .collect()
}

/// Distribution statistics for a continuous metric across N simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

/// Cross-run distribution of the end-of-run divergence figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleDist {
    pub max_divergence: DistStats,
    pub average_divergence: DistStats,
    pub growth_pct: DistStats,
}

/// Summaries from differently seeded runs of the same config.
/// Needs at least 2 runs for a distribution.
pub fn analyse_ensemble(summaries: &[DivergenceSummary]) -> Option<EnsembleDist> {
    if summaries.len() < 2 {
        return None;
    }
    let collect = |f: fn(&DivergenceSummary) -> f64| {
        let mut values: Vec<f64> = summaries.iter().map(f).collect();
        percentile_stats(&mut values)
    };
    Some(EnsembleDist {
        max_divergence: collect(|s| s.max_divergence)?,
        average_divergence: collect(|s| s.average_divergence)?,
        growth_pct: collect(|s| s.growth_pct)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::config::{DriftParams, TeamSelection};
    use crate::dates::generate_dates;
    use crate::simulation::{MetricRow, simulate};
    use crate::types::Granularity;

    fn row(day: u64, values: &[(Team, f64)]) -> MetricRow {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        MetricRow {
            date: start + chrono::Duration::days(day as i64),
            day: Day(day),
            values: values.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    fn three_team_table() -> MetricTable {
        use Team::*;
        MetricTable {
            teams: vec![Finance, Product, Marketing],
            rows: vec![
                row(0, &[(Finance, 100.0), (Product, 98.0), (Marketing, 104.0)]),
                row(7, &[(Finance, 95.0), (Product, 101.0), (Marketing, 113.0)]),
            ],
        }
    }

    #[test]
    fn pairs_follow_inclusion_order() {
        let pairs = team_pairs(&Team::ALL);
        let labels: Vec<String> = pairs.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["Finance vs Product", "Finance vs Marketing", "Product vs Marketing"]);
        assert!(team_pairs(&[Team::Product]).is_empty());
    }

    #[test]
    fn divergence_is_absolute_difference() {
        let div = divergence(&three_team_table()).unwrap();
        assert_eq!(div.rows[0].differences, vec![2.0, 4.0, 6.0]);
        assert_eq!(div.rows[0].average, 4.0);
        assert_eq!(div.rows[1].differences, vec![6.0, 18.0, 12.0]);
        assert_eq!(div.rows[1].average, 12.0);
        let fm = TeamPair { a: Team::Finance, b: Team::Marketing };
        assert_eq!(div.series(fm), Some(vec![4.0, 18.0]));
    }

    #[test]
    fn single_team_has_no_divergence() {
        let mut table = three_team_table();
        table.teams = vec![Team::Finance];
        for r in &mut table.rows {
            r.values.retain(|t, _| *t == Team::Finance);
        }
        assert!(divergence(&table).is_none());
    }

    #[test]
    fn disabled_team_is_excluded_from_pairs() {
        let dates = generate_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Granularity::Weekly,
        );
        let mut params = DriftParams::canonical();
        params.teams = TeamSelection { finance: true, product: false, marketing: true };
        let out = simulate(&dates, &params, &mut ChaCha20Rng::seed_from_u64(42));
        let div = divergence(&out.table).unwrap();
        assert_eq!(div.pairs, vec![TeamPair { a: Team::Finance, b: Team::Marketing }]);
        assert!(div.rows.iter().all(|r| r.differences.len() == 1 && r.average == r.differences[0]));
    }

    #[test]
    fn summary_measures_change_from_first_row() {
        let div = divergence(&three_team_table()).unwrap();
        let s = summarize(&div).unwrap();
        assert_eq!(s.max_divergence, 18.0);
        assert_eq!(s.max_divergence_change, 12.0);
        assert_eq!(s.average_divergence, 12.0);
        assert_eq!(s.average_divergence_change, 8.0);
        assert!((s.growth_pct - 200.0).abs() < 1e-10);
    }

    #[test]
    fn growth_is_zero_without_positive_baseline() {
        assert_eq!(growth_pct(0.0, 5.0), 0.0);
        assert_eq!(growth_pct(-1.0, 5.0), 0.0);
        assert!((growth_pct(4.0, 5.0) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn summary_of_empty_table_is_none() {
        let table = MetricTable { teams: Team::ALL.to_vec(), rows: Vec::new() };
        let div = divergence(&table).unwrap();
        assert!(summarize(&div).is_none());
    }

    #[test]
    fn definition_gap_reads_from_first_team() {
        let fp = TeamPair { a: Team::Finance, b: Team::Product };
        assert!(fp.definition_gap().starts_with("Finance only counts paying users"));
        let mp = TeamPair { a: Team::Marketing, b: Team::Product };
        assert!(mp.definition_gap().starts_with("Marketing includes campaign interactions"));
        for pair in team_pairs(&Team::ALL) {
            let gap = pair.definition_gap();
            assert!(gap.contains(pair.a.name()) && gap.contains(pair.b.name()), "{gap}");
        }
    }

    #[test]
    fn percent_difference_is_signed_and_guarded() {
        assert!((percent_difference(110.0, 100.0) - 10.0).abs() < 1e-10);
        assert!((percent_difference(90.0, 100.0) + 10.0).abs() < 1e-10);
        assert_eq!(percent_difference(5.0, 0.0), 0.0);
    }

    #[test]
    fn pair_gaps_use_last_row() {
        let gaps = pair_gaps(&three_team_table());
        assert_eq!(gaps.len(), 3);
        // last row: Finance 95, Product 101, Marketing 113
        assert_eq!(gaps[0].difference, -6.0);
        assert!((gaps[0].percent - (-6.0 / 101.0 * 100.0)).abs() < 1e-10);
        assert_eq!(gaps[2].pair, TeamPair { a: Team::Product, b: Team::Marketing });
        assert_eq!(gaps[2].difference, -12.0);
        let empty = MetricTable { teams: Team::ALL.to_vec(), rows: Vec::new() };
        assert!(pair_gaps(&empty).is_empty());
    }

    #[test]
    fn trends_report_first_last_mean() {
        let trends = team_trends(&three_team_table());
        assert_eq!(trends.len(), 3);
        assert_eq!(trends[2].team, Team::Marketing);
        assert_eq!(trends[2].first, 104.0);
        assert_eq!(trends[2].last, 113.0);
        assert_eq!(trends[2].mean, 108.5);
        assert_eq!(trends[2].change(), 9.0);
    }

    // ── Distribution analysis tests ───────────────────────────────────────────

    #[test]
    fn percentile_stats_known_values() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let ds = percentile_stats(&mut values).unwrap();
        assert_eq!(ds.n, 5);
        assert!((ds.min - 1.0).abs() < 1e-10, "min");
        assert!((ds.max - 5.0).abs() < 1e-10, "max");
        assert!((ds.p50 - 3.0).abs() < 1e-10, "p50");
        assert!((ds.p25 - 2.0).abs() < 1e-10, "p25");
        assert!((ds.mean - 3.0).abs() < 1e-10, "mean");
    }

    #[test]
    fn percentile_stats_empty_returns_none() {
        let mut values: Vec<f64> = vec![];
        assert!(percentile_stats(&mut values).is_none());
    }

    #[test]
    fn ensemble_needs_two_runs() {
        let s = summarize(&divergence(&three_team_table()).unwrap()).unwrap();
        assert!(analyse_ensemble(&[s]).is_none());
        let dist = analyse_ensemble(&[s, s]).unwrap();
        assert_eq!(dist.average_divergence.n, 2);
        assert_eq!(dist.average_divergence.p50, 12.0);
        assert_eq!(dist.growth_pct.std_dev, 0.0);
    }

    #[test]
    fn ensemble_p50_interpolates() {
        // p50 of [10, 20]: h = 0.5, lo = 0, hi = 1 → 15
        let base = summarize(&divergence(&three_team_table()).unwrap()).unwrap();
        let a = DivergenceSummary { average_divergence: 10.0, ..base };
        let b = DivergenceSummary { average_divergence: 20.0, ..base };
        let dist = analyse_ensemble(&[b, a]).unwrap();
        assert!((dist.average_divergence.p50 - 15.0).abs() < 1e-10);
        assert_eq!(dist.average_divergence.min, 10.0);
    }
}
