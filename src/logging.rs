//! Logging init for binaries and tests embedding the transport.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. This helper sets up the usual stderr formatter.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,httpretry=debug";

/// Initialize logging to stderr, honoring `RUST_LOG` when set.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_stderr() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
