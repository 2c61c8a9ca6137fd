/// Tracing subscriber setup
///
/// `RUST_LOG` takes precedence over the configured level. Installing a
/// subscriber is idempotent: once one is set, later calls leave it alone.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Build the filter for a log configuration
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber; returns `false` if one was already set
pub fn init(config: &LogConfig) -> bool {
    let filter = env_filter(config);

    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    installed.is_ok()
}
