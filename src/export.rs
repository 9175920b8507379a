use std::io::Write;

use serde::Serialize;

use crate::analysis::DivergenceSummary;
use crate::error::ExportError;
use crate::simulation::MetricTable;

/// Write the table as CSV: `date,day`, then one column per enabled team in
/// inclusion order. Values use the shortest representation that round-trips.
pub fn write_csv<W: Write>(table: &MetricTable, mut w: W) -> Result<(), ExportError> {
    write!(w, "date,day")?;
    for team in &table.teams {
        write!(w, ",{team}")?;
    }
    writeln!(w)?;

    for row in &table.rows {
        write!(w, "{},{}", row.date, row.day)?;
        for &team in &table.teams {
            match row.value(team) {
                Some(v) => write!(w, ",{v}")?,
                None => write!(w, ",")?,
            }
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// One JSON object per line.
pub fn write_ndjson<W: Write, T: Serialize>(items: &[T], mut w: W) -> Result<(), ExportError> {
    for item in items {
        serde_json::to_writer(&mut w, item)?;
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Per-seed end-of-run divergence for an ensemble. Runs with fewer than two
/// teams have no divergence and are skipped.
pub fn write_runs_csv<W: Write>(runs: &[(u64, Option<DivergenceSummary>)], mut w: W) -> Result<(), ExportError> {
    writeln!(w, "seed,max_divergence,max_divergence_change,average_divergence,average_divergence_change,growth_pct")?;
    for (seed, summary) in runs {
        let Some(s) = summary else { continue };
        writeln!(
            w,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            seed,
            s.max_divergence,
            s.max_divergence_change,
            s.average_divergence,
            s.average_divergence_change,
            s.growth_pct,
        )?;
    }
    w.flush()?;
    Ok(())
}
