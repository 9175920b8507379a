use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter, e.g. `METRIC_DRIFT_LOG=metric_drift=debug`.
pub const LOG_ENV: &str = "METRIC_DRIFT_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for tables and NDJSON. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("metric_drift=info,event_schedule=info,warn"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
