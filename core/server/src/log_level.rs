//! Runtime log level control.

use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{reload, EnvFilter, Registry};

use sharehub_common::{Error, Result};

/// Reload handle over the process-wide filter.
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Swaps the active log filter without restarting.
#[derive(Clone)]
pub struct LogLevel {
    handle: FilterHandle,
}

/// Parse a level name, accepting `warning` and `critical` as aliases.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    let normalized = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    };

    if normalized.is_empty() {
        return Err(Error::InvalidInput("Empty log level".to_string()));
    }

    LevelFilter::from_str(&normalized)
        .map_err(|_| Error::InvalidInput(format!("Invalid log level: {}", level)))
}

impl LogLevel {
    pub fn new(handle: FilterHandle) -> Self {
        Self { handle }
    }

    /// Replace the filter with one admitting `level` and above.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] for an unknown level
    /// - [`Error::Config`] when the subscriber is gone
    pub fn set(&self, level: &str) -> Result<LevelFilter> {
        let filter = parse_level(level)?;
        self.handle
            .reload(EnvFilter::new(filter.to_string()))
            .map_err(|e| Error::Config(format!("Cannot reload log filter: {}", e)))?;
        tracing::info!(level = %filter, "Log level changed");
        Ok(filter)
    }

    /// Current filter directives.
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}
