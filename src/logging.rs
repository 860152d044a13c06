//! Tracing subscriber setup
//!
//! The library only emits `tracing` events. Hosts that want them printed
//! call [`init`] once at startup.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered at the configured level
///
/// `RUST_LOG` takes precedence over the configured level when set. Returns
/// `false` if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
