//! Tracing setup.
//!
//! Structured logging through `tracing-subscriber`:
//! - Multiple output formats (pretty, compact, JSON)
//! - `RUST_LOG` filtering, falling back to the configured level
//! - Thread names on by default, so acquisition-thread events are easy to spot
//!
//! # Example
//! ```no_run
//! use rust_cld::{config::Settings, tracing_init};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! tracing_init::init_from_settings(&settings)?;
//! tracing::info!("Application started");
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use crate::error::{CldError, CldResult};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = CldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            _ => Err(CldError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: pretty, compact, json",
                s
            ))),
        }
    }
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level used when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include span events (NEW, CLOSE)
    pub with_span_events: bool,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to include thread names
    pub with_thread_names: bool,
    /// Whether to enable ANSI colors (Pretty only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Tracing config from application settings.
    pub fn from_settings(settings: &Settings) -> CldResult<Self> {
        Ok(Self {
            level: parse_log_level(&settings.application.log_level)?,
            format: settings.application.log_format.parse()?,
            ..Default::default()
        })
    }

    /// Tracing config at `level` with default options.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable span events
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing from application settings.
pub fn init_from_settings(settings: &Settings) -> CldResult<()> {
    init(TracingConfig::from_settings(settings)?)
}

/// Initialize tracing.
///
/// Idempotent: if a global subscriber is already installed this returns `Ok(())`,
/// which keeps it safe to call from tests.
pub fn init(config: TracingConfig) -> CldResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        OutputFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
        OutputFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(false)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
        OutputFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).try_init()
        }
    };

    tolerate_existing(result)
}

fn tolerate_existing(result: Result<(), TryInitError>) -> CldResult<()> {
    match result {
        Ok(()) => Ok(()),
        // Already initialized elsewhere, expected in tests.
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(CldError::Configuration(format!(
            "Failed to initialize tracing: {}",
            e
        ))),
    }
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> CldResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(CldError::Configuration(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("Debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("INFO").unwrap(), Level::INFO);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings::default();
        settings.application.log_level = "debug".to_string();
        settings.application.log_format = "json".to_string();

        let config = TracingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.with_thread_names);
    }

    #[test]
    fn test_bad_format_is_rejected() {
        let mut settings = Settings::default();
        settings.application.log_format = "xml".to_string();
        assert!(TracingConfig::from_settings(&settings).is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Compact)
            .with_ansi(false);
        init(config.clone()).unwrap();
        init(config).unwrap();
    }
}
