//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Install a formatting subscriber
///
/// `RUST_LOG` takes precedence; otherwise the level follows
/// [`CoreConfig::debug`]. Returns `false` if a global subscriber was
/// already installed.
pub fn init(config: &CoreConfig) -> bool {
    let fallback = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
