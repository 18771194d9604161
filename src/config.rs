//! Application settings using Figment.
//!
//! Settings are layered from:
//! 1. `config/settings.toml` (or the path given to [`Settings::load_from`])
//! 2. Environment variables prefixed with `RUST_CLD_`, nested keys separated by `__`
//!
//! Every section has defaults, so a missing file yields a usable configuration.
//!
//! # Example
//! ```no_run
//! use rust_cld::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("Application: {}", settings.application.name);
//! # Ok::<(), rust_cld::error::CldError>(())
//! ```

use crate::error::{CldError, CldResult};
use crate::log_file::DEFAULT_TIMESTAMP_FORMAT;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationSettings,
    /// Object document location
    pub objects: ObjectsSettings,
    /// Acquisition loop settings
    pub acquisition: AcquisitionSettings,
    /// Log rotation settings
    pub archive: ArchiveSettings,
}

/// Application-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: "cld-log".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Where the object document lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectsSettings {
    /// Path of the object document
    pub path: PathBuf,
}

impl Default for ObjectsSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/cld.toml"),
        }
    }
}

/// Acquisition loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Tick interval in milliseconds (1-60000)
    pub interval_ms: u64,
    /// Seed for the simulated source; entropy when unset
    pub seed: Option<u64>,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            seed: None,
        }
    }
}

impl AcquisitionSettings {
    /// The interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Log rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// strftime format of archive suffixes, for logs that do not set their own
    pub timestamp_format: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl Settings {
    /// Load from `config/settings.toml` and the environment.
    ///
    /// Example override: `RUST_CLD_ACQUISITION__INTERVAL_MS=250`
    pub fn load() -> CldResult<Self> {
        Self::load_from(DEFAULT_SETTINGS_PATH)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CldResult<Self> {
        Ok(Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RUST_CLD_").split("__"))
            .extract()?)
    }

    /// Parse settings from a TOML string, without the environment.
    pub fn from_toml(source: &str) -> CldResult<Self> {
        Ok(Figment::new().merge(Toml::string(source)).extract()?)
    }

    /// Validate settings after loading.
    pub fn validate(&self) -> CldResult<()> {
        if !VALID_LEVELS.contains(&self.application.log_level.as_str()) {
            return Err(CldError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        if !VALID_FORMATS.contains(&self.application.log_format.as_str()) {
            return Err(CldError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_FORMATS.join(", ")
            )));
        }

        if !(1..=60_000).contains(&self.acquisition.interval_ms) {
            return Err(CldError::Configuration(format!(
                "Invalid acquisition interval_ms {}. Must be 1-60000",
                self.acquisition.interval_ms
            )));
        }

        if self.archive.timestamp_format.trim().is_empty() {
            return Err(CldError::Configuration(
                "archive timestamp_format must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
