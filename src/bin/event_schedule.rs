//! Prints the definition-change schedule for a horizon as NDJSON.
//!
//! usage: event_schedule [max_day] [start_date]
//!
//! `max_day` defaults to 90 (all three events); with a `start_date` each
//! line also carries the calendar date the event lands on.

use std::io::{self, BufWriter};
use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::info;

use metric_drift::events::{annotate, derive_events};
use metric_drift::export::write_ndjson;
use metric_drift::logging::init_tracing;
use metric_drift::types::{Day, Team};

fn main() -> ExitCode {
    init_tracing();
    let mut args = std::env::args().skip(1);

    let max_day = match args.next().map(|s| s.parse::<u64>()) {
        None => Day(90),
        Some(Ok(d)) => Day(d),
        Some(Err(e)) => {
            eprintln!("error: max_day must be a non-negative integer: {e}");
            return ExitCode::FAILURE;
        }
    };
    let start = match args.next().map(|s| s.parse::<NaiveDate>()) {
        None => None,
        Some(Ok(d)) => Some(d),
        Some(Err(e)) => {
            eprintln!("error: start_date must be YYYY-MM-DD: {e}");
            return ExitCode::FAILURE;
        }
    };

    let events = derive_events(max_day);
    let stdout = BufWriter::new(io::stdout().lock());
    let written = match start {
        Some(start) => write_ndjson(&annotate(&events, start, max_day), stdout),
        None => write_ndjson(&events, stdout),
    };
    if let Err(e) = written {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    info!(max_day = max_day.0, events = events.len(), "event schedule written");
    for team in Team::ALL {
        match events.iter().find(|e| e.team == team) {
            Some(e) => eprintln!("  {:<10} day {:>3}", team.name(), e.day),
            None => eprintln!("  {:<10} (horizon too short)", team.name()),
        }
    }
    ExitCode::SUCCESS
}
