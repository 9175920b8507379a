use std::fmt::Display;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use tracing::{info, warn};

use metric_drift::analysis::{self, DistStats, DivergenceSummary, EnsembleDist};
use metric_drift::config::{ConfigFile, SimulationConfig};
use metric_drift::error::{ConfigError, ExportError};
use metric_drift::dates::date_points;
use metric_drift::events::{annotate, derive_events, events_for};
use metric_drift::export;
use metric_drift::logging::init_tracing;
use metric_drift::simulation::{self, SimulationOutput};
use metric_drift::types::Team;

const USAGE: &str = "\
usage: metric-drift [options]

  --config <file.toml>        load parameters from a TOML file (flags override it)
  --start <YYYY-MM-DD>        first date (default: end - 90 days)
  --end <YYYY-MM-DD>          last date (default: today)
  --granularity <g>           daily | weekly | monthly (default: weekly)
  --teams <list>              comma-separated: finance,product,marketing | none
  --base-drift <f>            0.0 ..= 1.0 (default 0.2)
  --context-factor <f>        0.0 ..= 2.0 (default 1.0)
  --seasonality <f>           0.0 ..= 1.0 (default 0.3)
  --noise <f>                 0.0 ..= 0.5 (default 0.1)
  --finance-weight <f>        0.5 ..= 1.5 (default 1.2)
  --product-weight <f>        0.5 ..= 1.5 (default 0.8)
  --marketing-weight <f>      0.5 ..= 1.5 (default 1.0)
  --seed <u64>                seed the noise stream (default: random)
  --csv <path>                write the metric table (or per-run summaries with --runs)
  --events <path>             write definition-change events as NDJSON
  --runs <n>                  run n consecutive seeds in parallel and report distributions
  --quiet                     no report on stdout
";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}: {reason}")]
    InvalidValue { flag: String, value: String, reason: String },

    #[error("unknown argument '{0}' (see --help)")]
    UnknownArgument(String),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Default)]
struct OutputOptions {
    csv_path: Option<PathBuf>,
    events_path: Option<PathBuf>,
    quiet: bool,
}

#[derive(Debug, Default)]
struct Args {
    help: bool,
    config_path: Option<PathBuf>,
    overrides: ConfigFile,
    runs: Option<u64>,
    output: OutputOptions,
}

fn main() -> ExitCode {
    init_tracing();
    match run(std::env::args().skip(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(raw_args: impl IntoIterator<Item = String>) -> Result<(), CliError> {
    let Args { help, config_path, overrides, runs, output } = parse_args(raw_args)?;
    if help {
        print!("{USAGE}");
        return Ok(());
    }

    let config = build_config(config_path.as_deref(), overrides, Local::now().date_naive())?;

    let seed = config.resolve_seed();
    info!(
        seed,
        start = %config.start,
        end = %config.end,
        granularity = %config.granularity,
        teams = config.params.teams.enabled().len(),
        "simulation configured"
    );

    match runs {
        Some(n) => run_ensemble(&config, seed, n, &output),
        None => run_single(&config, seed, &output),
    }
}

/// File values first, flags on top, then defaults for anything still unset.
fn build_config(config_path: Option<&Path>, overrides: ConfigFile, today: NaiveDate) -> Result<SimulationConfig, CliError> {
    let file = match config_path {
        Some(path) => {
            let file = ConfigFile::load(path)?;
            info!(path = %path.display(), "loaded config file");
            file
        }
        None => ConfigFile::default(),
    };
    let config = file.merged(overrides).resolve(today);
    config.validate()?;
    Ok(config)
}

fn parse_args(raw_args: impl IntoIterator<Item = String>) -> Result<Args, CliError> {
    let mut args = raw_args.into_iter();
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        let mut value = || args.next().ok_or_else(|| CliError::MissingValue(arg.clone()));
        let o = &mut parsed.overrides;
        match arg.as_str() {
            "--help" | "-h" => parsed.help = true,
            "--config" => parsed.config_path = Some(PathBuf::from(value()?)),
            "--seed" => o.seed = Some(parse_value(&arg, value()?)?),
            "--start" => o.start = Some(parse_value::<NaiveDate>(&arg, value()?)?),
            "--end" => o.end = Some(parse_value::<NaiveDate>(&arg, value()?)?),
            "--granularity" => o.granularity = Some(value()?.parse()?),
            "--teams" => o.teams = Some(parse_teams(&value()?)?),
            "--base-drift" => o.base_drift = Some(parse_value(&arg, value()?)?),
            "--context-factor" => o.context_factor = Some(parse_value(&arg, value()?)?),
            "--seasonality" => o.seasonality = Some(parse_value(&arg, value()?)?),
            "--noise" => o.noise_level = Some(parse_value(&arg, value()?)?),
            "--finance-weight" => o.finance_weight = Some(parse_value(&arg, value()?)?),
            "--product-weight" => o.product_weight = Some(parse_value(&arg, value()?)?),
            "--marketing-weight" => o.marketing_weight = Some(parse_value(&arg, value()?)?),
            "--csv" => parsed.output.csv_path = Some(PathBuf::from(value()?)),
            "--events" => parsed.output.events_path = Some(PathBuf::from(value()?)),
            "--runs" => {
                let raw = value()?;
                let n: u64 = parse_value(&arg, raw.clone())?;
                if n == 0 {
                    return Err(CliError::InvalidValue {
                        flag: arg,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                parsed.runs = Some(n);
            }
            "--quiet" => parsed.output.quiet = true,
            _ => return Err(CliError::UnknownArgument(arg)),
        }
    }
    Ok(parsed)
}

fn parse_value<T>(flag: &str, raw: String) -> Result<T, CliError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.parse() {
        Ok(v) => Ok(v),
        Err(e) => Err(CliError::InvalidValue { flag: flag.to_string(), value: raw, reason: e.to_string() }),
    }
}

fn parse_teams(raw: &str) -> Result<Vec<Team>, ConfigError> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    raw.split(',').filter(|s| !s.trim().is_empty()).map(str::parse).collect()
}

fn create(path: &Path) -> Result<BufWriter<File>, CliError> {
    let file = File::create(path).map_err(|source| CliError::Create { path: path.to_path_buf(), source })?;
    Ok(BufWriter::new(file))
}

fn run_single(config: &SimulationConfig, seed: u64, output: &OutputOptions) -> Result<(), CliError> {
    let sim = simulation::run_seeded(config, seed);

    if let Some(path) = &output.csv_path {
        export::write_csv(&sim.table, create(path)?)?;
        info!(path = %path.display(), rows = sim.table.len(), "wrote metric table");
    }
    if let Some(path) = &output.events_path {
        export::write_ndjson(&sim.events, create(path)?)?;
        info!(path = %path.display(), events = sim.events.len(), "wrote events");
    }

    if !output.quiet {
        print_report(config, seed, &sim);
    }
    Ok(())
}

fn run_ensemble(config: &SimulationConfig, start_seed: u64, n: u64, output: &OutputOptions) -> Result<(), CliError> {
    if config.params.teams.enabled().len() < 2 {
        warn!("divergence needs at least two teams; per-run summaries will be empty");
    }

    let runs: Vec<(u64, Option<DivergenceSummary>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let seed = start_seed.wrapping_add(i);
            let sim = simulation::run_seeded(config, seed);
            let summary = analysis::divergence(&sim.table).as_ref().and_then(analysis::summarize);
            (seed, summary)
        })
        .collect();
    info!(runs = runs.len(), "ensemble complete");

    if let Some(path) = &output.csv_path {
        export::write_runs_csv(&runs, create(path)?)?;
        info!(path = %path.display(), "wrote per-run summaries");
    }
    if let Some(path) = &output.events_path {
        // Events depend only on the horizon, so every run shares them.
        let max_day = date_points(&config.dates()).last().map(|p| p.day).unwrap_or_default();
        let events = derive_events(max_day);
        export::write_ndjson(&events, create(path)?)?;
        info!(path = %path.display(), events = events.len(), "wrote events");
    }

    if !output.quiet {
        print_runs(&runs);
        let summaries: Vec<DivergenceSummary> = runs.iter().filter_map(|(_, s)| *s).collect();
        match analysis::analyse_ensemble(&summaries) {
            Some(dist) => print_distribution(&dist, summaries.len()),
            None => warn!("distribution requires >= 2 runs with divergence"),
        }
    }
    Ok(())
}

// ── Single-run report ─────────────────────────────────────────────────────────

fn print_report(config: &SimulationConfig, seed: u64, sim: &SimulationOutput) {
    let table = &sim.table;
    println!(
        "=== Metric values ({}, {} to {}, seed {seed}) ===",
        config.granularity, config.start, config.end
    );
    if table.is_empty() {
        println!("  (no dates in range)");
        return;
    }

    print!("{:>10} | {:>5}", "Date", "Day");
    for team in &table.teams {
        print!(" | {:>10}", team.name());
    }
    println!();
    println!("{}", "-".repeat(18 + 13 * table.teams.len()));
    for row in &table.rows {
        print!("{:>10} | {:>5}", row.date.to_string(), row.day);
        for &team in &table.teams {
            print!(" | {:>10.2}", row.value(team).unwrap_or(0.0));
        }
        println!();
    }

    println!("\n=== Definition changes ===");
    let start = table.start_date().unwrap_or(config.start);
    let notes = annotate(&sim.events, start, table.max_day());
    if notes.is_empty() {
        println!("  none (horizon shorter than 30 days)");
    }
    for note in &notes {
        println!("  day {:>4} ({}): {}", note.day, note.date, note.description);
    }

    println!("\n=== Team trends ===");
    println!("{:>10} | {:>9} | {:>9} | {:>9} | {:>9}", "Team", "First", "Last", "Mean", "Change");
    for t in analysis::team_trends(table) {
        println!(
            "{:>10} | {:>9.2} | {:>9.2} | {:>9.2} | {:>+9.2}",
            t.team.name(),
            t.first,
            t.last,
            t.mean,
            t.change()
        );
    }

    print_divergence(sim);

    println!("\n=== Team perspectives ===");
    for &team in &table.teams {
        println!("  {team}");
        for line in team.perspective() {
            println!("    * {line}");
        }
        for (i, stage) in team.pipeline().iter().enumerate() {
            println!("    {}. {}: {}", i + 1, stage.label, stage.content);
        }
        for e in events_for(&sim.events, team) {
            println!("    ! day {}: {}", e.day, e.description);
        }
    }
}

fn print_divergence(sim: &SimulationOutput) {
    println!("\n=== Divergence ===");
    let Some(div) = analysis::divergence(&sim.table) else {
        println!("  select at least two teams to see divergence analysis");
        return;
    };

    print!("{:>10}", "Date");
    for pair in &div.pairs {
        print!(" | {:>22}", pair.to_string());
    }
    println!(" | {:>8}", "Avg");
    for row in &div.rows {
        print!("{:>10}", row.date.to_string());
        for d in &row.differences {
            print!(" | {d:>22.2}");
        }
        println!(" | {:>8.2}", row.average);
    }

    if let Some(s) = analysis::summarize(&div) {
        println!();
        println!("  Max team divergence: {:>8.1} ({:+.1})", s.max_divergence, s.max_divergence_change);
        println!("  Average divergence:  {:>8.1} ({:+.1})", s.average_divergence, s.average_divergence_change);
        println!("  Divergence growth:   {:>7.1}%", s.growth_pct);
    }

    println!("\n=== Definition gaps (last date) ===");
    for gap in analysis::pair_gaps(&sim.table) {
        println!("  {:<22} {:>+9.2} ({:+.1}%)", gap.pair.to_string(), gap.difference, gap.percent);
        println!("    {}", gap.pair.definition_gap());
    }
}

// ── Ensemble report ───────────────────────────────────────────────────────────

fn print_runs(runs: &[(u64, Option<DivergenceSummary>)]) {
    println!("=== Per-run divergence ===");
    println!("{:>20} | {:>8} | {:>8} | {:>8}", "Seed", "MaxDiv", "AvgDiv", "Growth%");
    println!("{}", "-".repeat(53));
    for (seed, summary) in runs {
        match summary {
            Some(s) => println!(
                "{:>20} | {:>8.2} | {:>8.2} | {:>7.1}%",
                seed, s.max_divergence, s.average_divergence, s.growth_pct
            ),
            None => println!("{seed:>20} | {:>8} | {:>8} | {:>8}", "-", "-", "-"),
        }
    }
}

fn print_dist_line(label: &str, ds: &DistStats) {
    println!(
        "{:>8} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2}",
        label, ds.min, ds.p5, ds.p25, ds.p50, ds.p75, ds.p95, ds.max, ds.mean, ds.std_dev,
    );
}

fn print_distribution(dist: &EnsembleDist, n_runs: usize) {
    println!("\n=== Multi-Run Distribution (N={n_runs} runs) ===");
    println!(
        "{:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
        "Metric", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    print_dist_line("MaxDiv", &dist.max_divergence);
    print_dist_line("AvgDiv", &dist.average_divergence);
    print_dist_line("Growth%", &dist.growth_pct);
}
