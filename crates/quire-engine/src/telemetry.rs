//! # Tracing Setup
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show all debug logs
//! - `RUST_LOG=quire=trace` - Show trace for quire crates only
//! - Default: INFO, DEBUG for quire crates, WARN for sqlx

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,quire=debug,sqlx=warn";

/// Installs the global fmt subscriber with the default filter.
///
/// Returns `false` if a subscriber was already installed (tests, embedders).
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

pub fn init_tracing_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .try_init()
        .is_ok()
}
