//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all DAX applications, plus the rig and safety configuration
//! structs consumed by `dax_hal` and `dax_safety`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dax_common::config::{ConfigLoader, RigConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), dax_common::config::ConfigError> {
//!     let config = RigConfig::load(Path::new("config/rig.toml"))?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_MONITOR_INTERVAL_MS, DEFAULT_REACTION_BUDGET_MS, DEFAULT_TICK_MS,
    DEFAULT_WATCHDOG_TIMEOUT_MS, MAX_AXES,
};
use crate::encoder::MotionPattern;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Common configuration fields shared across all DAX applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "dax-rig-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Returns `ConfigError::ValidationError` if semantic validation fails
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        debug!("Loaded configuration from {:?}", path);
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Per-axis motion profile configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis name (for logs and state files).
    pub name: String,

    /// Acceleration in steps/s².
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,

    /// Deceleration in steps/s².
    #[serde(default = "default_deceleration")]
    pub deceleration: f64,

    /// Maximum speed in steps/s.
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Minimum speed in steps/s.
    #[serde(default)]
    pub min_speed: f64,

    /// Encoder configuration for this axis.
    #[serde(default)]
    pub encoder: EncoderConfig,
}

fn default_acceleration() -> f64 {
    1000.0
}

fn default_deceleration() -> f64 {
    1000.0
}

fn default_max_speed() -> f64 {
    500.0
}

impl AxisConfig {
    /// Validate the motion profile parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "axis name cannot be empty".to_string(),
            ));
        }
        if self.acceleration <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {}: acceleration must be > 0",
                self.name
            )));
        }
        if self.deceleration <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {}: deceleration must be > 0",
                self.name
            )));
        }
        if self.max_speed <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {}: max_speed must be > 0",
                self.name
            )));
        }
        if self.min_speed < 0.0 || self.min_speed >= self.max_speed {
            return Err(ConfigError::ValidationError(format!(
                "axis {}: min_speed must be in [0, max_speed)",
                self.name
            )));
        }
        self.encoder.validate(&self.name)
    }
}

/// Per-axis encoder simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Motion pattern driving the simulated angle.
    #[serde(default)]
    pub pattern: MotionPattern,

    /// Pattern parameter: velocity in deg/s (Linear) or amplitude in deg
    /// (Sinusoidal). Ignored for Static.
    #[serde(default)]
    pub pattern_param: f64,

    /// Peak amplitude of the simulated sensor noise in degrees.
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
}

fn default_noise_amplitude() -> f64 {
    0.1
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            pattern: MotionPattern::Static,
            pattern_param: 0.0,
            noise_amplitude: default_noise_amplitude(),
        }
    }
}

impl EncoderConfig {
    fn validate(&self, axis: &str) -> Result<(), ConfigError> {
        if self.noise_amplitude < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {axis}: noise_amplitude must be >= 0"
            )));
        }
        if self.pattern == MotionPattern::Sinusoidal && self.pattern_param <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {axis}: sinusoidal pattern requires amplitude > 0"
            )));
        }
        Ok(())
    }
}

/// Watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Hard timeout in milliseconds.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub timeout_ms: u32,

    /// Warning threshold as a fraction of `timeout_ms`, strictly below 1.
    ///
    /// A refresh gap above `timeout_ms * warn_fraction` counts as missed.
    #[serde(default = "default_warn_fraction")]
    pub warn_fraction: f64,
}

fn default_watchdog_timeout_ms() -> u32 {
    DEFAULT_WATCHDOG_TIMEOUT_MS
}

fn default_warn_fraction() -> f64 {
    0.75
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_watchdog_timeout_ms(),
            warn_fraction: default_warn_fraction(),
        }
    }
}

impl WatchdogConfig {
    /// Warning threshold in milliseconds.
    pub fn warn_threshold_ms(&self) -> u32 {
        (self.timeout_ms as f64 * self.warn_fraction) as u32
    }

    /// Validate the watchdog parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "watchdog timeout_ms must be > 0".to_string(),
            ));
        }
        if self.warn_fraction <= 0.0 || self.warn_fraction >= 1.0 {
            return Err(ConfigError::ValidationError(
                "watchdog warn_fraction must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Safety core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Fault-monitor poll interval in milliseconds.
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u32,

    /// Emergency-stop reaction budget in milliseconds.
    #[serde(default = "default_reaction_budget_ms")]
    pub reaction_budget_ms: u32,

    /// Minimum time after a trigger before a reset request is accepted.
    #[serde(default = "default_reset_cooldown_ms")]
    pub reset_cooldown_ms: u32,

    /// Watchdog configuration.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

fn default_monitor_interval_ms() -> u32 {
    DEFAULT_MONITOR_INTERVAL_MS
}

fn default_reaction_budget_ms() -> u32 {
    DEFAULT_REACTION_BUDGET_MS
}

fn default_reset_cooldown_ms() -> u32 {
    100
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            monitor_interval_ms: default_monitor_interval_ms(),
            reaction_budget_ms: default_reaction_budget_ms(),
            reset_cooldown_ms: default_reset_cooldown_ms(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

impl SafetyConfig {
    /// Validate the safety parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "monitor_interval_ms must be > 0".to_string(),
            ));
        }
        if self.reaction_budget_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reaction_budget_ms must be > 0".to_string(),
            ));
        }
        self.watchdog.validate()
    }
}

/// Top-level rig configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "dax-rig-01"
///
/// [[axis]]
/// name = "x"
/// acceleration = 1000.0
/// deceleration = 1000.0
/// max_speed = 500.0
///
/// [[axis]]
/// name = "y"
///
/// [safety]
/// monitor_interval_ms = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Shared application configuration.
    pub shared: SharedConfig,

    /// Simulation tick period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u32,

    /// Optional sim-state persistence file.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Per-axis configuration, at most [`MAX_AXES`] entries.
    #[serde(rename = "axis")]
    pub axes: Vec<AxisConfig>,

    /// Safety core configuration.
    #[serde(default)]
    pub safety: SafetyConfig,
}

fn default_tick_ms() -> u32 {
    DEFAULT_TICK_MS
}

impl RigConfig {
    /// Validate the whole configuration tree.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_ms must be > 0".to_string(),
            ));
        }
        if self.axes.is_empty() || self.axes.len() > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "axis count must be in [1, {MAX_AXES}]"
            )));
        }
        for axis in &self.axes {
            axis.validate()?;
        }
        self.safety.validate()
    }
}
