//! Tracing setup for hosts that do not install their own subscriber.

use anyhow::{Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "PROCSESSION_LOG";

/// Map a level name to a filter.
///
/// Accepts the usual tracing names plus `CRITICAL`, `WARNING` and `NOTSET`,
/// case-insensitively. Returns `None` for anything else.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    let level = match name.trim().to_ascii_uppercase().as_str() {
        "OFF" => LevelFilter::OFF,
        "CRITICAL" | "FATAL" | "ERROR" => LevelFilter::ERROR,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "INFO" => LevelFilter::INFO,
        "DEBUG" => LevelFilter::DEBUG,
        "NOTSET" | "TRACE" => LevelFilter::TRACE,
        _ => return None,
    };
    Some(level)
}

/// Install a stderr `fmt` subscriber.
///
/// The filter comes from `PROCSESSION_LOG`, then `RUST_LOG`, then
/// `default_level`. Returns `false` when a global subscriber was already
/// installed.
pub fn init_tracing(default_level: &str) -> Result<bool> {
    let level = parse_level(default_level)
        .ok_or_else(|| anyhow!("unknown log level `{default_level}`"))?;

    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping procsession setup");
        return Ok(false);
    }

    Ok(true)
}
