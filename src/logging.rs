//! Tracing setup shared by the binaries.

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise the library and the calling binary
/// (`bin_target`) log at `config.level`.
pub fn init_logging(config: &LoggingConfig, bin_target: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(default_directives(&config.level, bin_target))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn default_directives(level: &str, bin_target: &str) -> String {
    format!("quality_forecast={level},{bin_target}={level}")
}
