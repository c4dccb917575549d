// Logging setup
// Installs a tracing subscriber writing to stderr

use color_eyre::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding a full filter directive, e.g. `axial_service=debug`
pub const LOG_ENV: &str = "AXIAL_LOG";

/// Initialize logging. `AXIAL_LOG` wins over the `-v` count.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = build_env_filter(verbosity);

    Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    Ok(())
}

fn build_env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
