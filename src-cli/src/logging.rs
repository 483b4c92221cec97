use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_ENV: &str = "MALARIA_TRIAGE_LOG";

/// Install the stderr subscriber. Levels come from `MALARIA_TRIAGE_LOG`
/// (e.g. `triage_ai=debug,info`), falling back to `info`.
///
/// Stdout is reserved for assessment JSON.
pub fn init_tracing(json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        } else {
            registry
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    });
}
