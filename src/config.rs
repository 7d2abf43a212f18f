//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::device::{SessionOptions, XIAOMI_GAMEPAD_PRODUCT_ID, XIAOMI_VENDOR_ID};
use crate::error::{Result, XiaomiFfError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller selection
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id")]
    pub product_id: u16,

    /// Explicit `/dev/hidrawN` path; auto-detected when absent
    #[serde(default)]
    pub hidraw_path: Option<String>,
}

/// Dispatch behaviour
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    #[serde(default)]
    pub zero_on_detach: bool,
}

/// Rumble pulse played once the controller is attached
#[derive(Debug, Deserialize, Clone)]
pub struct StartupConfig {
    #[serde(default = "default_pulse_weak")]
    pub pulse_weak: u16,

    #[serde(default = "default_pulse_strong")]
    pub pulse_strong: u16,

    /// Pulse length; 0 disables the pulse
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_vendor_id() -> u16 { XIAOMI_VENDOR_ID }
fn default_product_id() -> u16 { XIAOMI_GAMEPAD_PRODUCT_ID }

fn default_pulse_weak() -> u16 { 0x8000 }
fn default_pulse_strong() -> u16 { 0x8000 }
fn default_pulse_ms() -> u64 { 250 }

fn default_log_level() -> String { "info".to_string() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            hidraw_path: None,
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            pulse_weak: default_pulse_weak(),
            pulse_strong: default_pulse_strong(),
            pulse_ms: default_pulse_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xiaomi_ff::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Options handed to each attached session
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            zero_on_detach: self.dispatch.zero_on_detach,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.device.vendor_id == 0 || self.device.product_id == 0 {
            return Err(invalid("vendor_id and product_id must be non-zero"));
        }

        if let Some(path) = &self.device.hidraw_path {
            if path.is_empty() {
                return Err(invalid("hidraw_path cannot be empty (omit it to auto-detect)"));
            }
        }

        if self.startup.pulse_ms > 10000 {
            return Err(invalid("pulse_ms must be between 0 and 10000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> XiaomiFfError {
    XiaomiFfError::Config(toml::de::Error::custom(msg))
}
