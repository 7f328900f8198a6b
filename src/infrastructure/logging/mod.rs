//! Structured logging initialization: stdout only, JSON or pretty,
//! driven by [`LoggingConfig`]. Simplified from the file-rotation variant
//! this is grounded on (`infrastructure/logging/logger.rs`), since this
//! service logs to stdout under a process supervisor rather than
//! managing its own rotated log files.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::LoggingConfig;

/// Holds nothing today, but reserves the spot where a `WorkerGuard` would
/// live if file output were added later.
pub struct Logger;

impl Logger {
    /// Install the global `tracing` subscriber. Must be called exactly
    /// once, before any other part of the service logs.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level: tracing::Level = config
            .level
            .parse()
            .map_err(|_| anyhow!("invalid log level: {}", config.level))?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        match config.format.as_str() {
            "pretty" => {
                let layer = tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_line_number(true)
                    .with_filter(env_filter);
                tracing_subscriber::registry().with(layer).init();
            }
            _ => {
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(env_filter);
                tracing_subscriber::registry().with(layer).init();
            }
        }

        tracing::info!(level = %config.level, format = %config.format, "logger initialized");
        Ok(Self)
    }
}
