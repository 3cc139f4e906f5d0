//! Diagnostic logging setup.
//!
//! Logs always go to stderr. Stdout belongs to the JSON and title
//! consumers, whose output is data rather than diagnostics.
//!
//! ```no_run
//! use biblio_ingest::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap();
//! init_logging(&config).unwrap();
//! tracing::info!("ready");
//! ```

use crate::error::{IngestError, Result};
use std::fmt;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable holding the minimum level.
pub const LEVEL_ENV: &str = "LOG_LEVEL";
/// Environment variable holding the output format.
pub const FORMAT_ENV: &str = "LOG_FORMAT";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(IngestError::Config(format!("Invalid log format: {s}"))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum level shown.
    pub level: Level,
    /// Output layout.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// Read `LOG_LEVEL` and `LOG_FORMAT`, defaulting unset values.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] for an unparseable value.
    pub fn from_env() -> Result<Self> {
        let mut config = LogConfig::default();
        if let Ok(level) = std::env::var(LEVEL_ENV) {
            config.level = parse_level(&level)?;
        }
        if let Ok(format) = std::env::var(FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Set the level from a name such as `debug`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] for an unknown level.
    pub fn with_level(mut self, level: &str) -> Result<Self> {
        self.level = parse_level(level)?;
        Ok(self)
    }
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "warning" => Ok(Level::WARN),
        other => other
            .parse()
            .map_err(|_| IngestError::Config(format!("Invalid log level: {level}"))),
    }
}

/// Install the global subscriber. Call once, at startup.
///
/// `RUST_LOG` directives, when set, are layered on top of the level.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());
    let layer = layer_fmt::layer().with_writer(std::io::stderr).with_target(false);
    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
    };
    installed.map_err(|e| IngestError::Config(format!("Could not install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_with_level() {
        let config = LogConfig::default().with_level("Warning").unwrap();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(
            LogConfig::default().with_level("debug").unwrap().level,
            Level::DEBUG
        );
        assert!(LogConfig::default().with_level("loud").is_err());
    }
}
