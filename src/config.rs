//! Configuration management for Thermae
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{Result, ThermaeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node name, unique per site. Used as the network hostname and as the
    /// telemetry node tag.
    pub node_name: String,

    /// Grid meter endpoint configuration
    pub meter: MeterConfig,

    /// Contactor output line configuration
    pub contactor: ContactorConfig,

    /// Compiled-in defaults for the two persisted settings
    pub defaults: DefaultsConfig,

    /// EmonCMS-style telemetry collector configuration
    pub telemetry: TelemetryConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Release update checks
    pub updater: UpdaterConfig,

    /// Path of the persisted-settings slot file
    pub settings_file: String,
}

/// Response body shapes the grid meter can return.
///
/// Replaces the firmware-style compile-time meter selection with a runtime
/// value so both parsers are exercised from one binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterFormat {
    /// Comma-delimited text; watts follow the first comma (IotaWatt CSV query)
    Csv,
    /// Colon-delimited object text; watts follow the first colon (Shelly EM)
    Object,
}

/// Grid meter endpoint parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Full query URL returning the current grid power
    pub url: String,

    /// Response body shape
    pub format: MeterFormat,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Contactor output line parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactorConfig {
    /// GPIO character device path
    pub chip: String,

    /// Line offset driving the contactor relay
    pub line: u32,
}

/// Compiled-in defaults for the persisted settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Export threshold magnitude in watts
    pub threshold_watts: i32,

    /// Minimum re-trigger interval in milliseconds
    pub interval_ms: u32,
}

/// Telemetry collector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether telemetry pushes are enabled
    pub enabled: bool,

    /// Collector host
    pub host: String,

    /// Collector TCP port
    pub port: u16,

    /// Collector API key
    pub api_key: String,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory (or file path whose parent is used) for rotated log files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Release update check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Whether periodic update checks run
    pub enabled: bool,

    /// URL of a plain-text version manifest
    pub manifest_url: String,

    /// Seconds between checks
    pub check_interval_secs: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.1.100/query?select=[time.local.iso,Mains.Watts]&begin=m-1m&end=m&group=m&format=csv".to_string(),
            format: MeterFormat::Csv,
            timeout_secs: 10,
        }
    }
}

impl Default for ContactorConfig {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".to_string(),
            line: 10,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            threshold_watts: 2200,
            interval_ms: 300_000,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "192.168.1.50".to_string(),
            port: 80,
            api_key: String::new(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/var/log/thermae".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            manifest_url: String::new(),
            check_interval_secs: 3600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: "HWSRedirector".to_string(),
            meter: MeterConfig::default(),
            contactor: ContactorConfig::default(),
            defaults: DefaultsConfig::default(),
            telemetry: TelemetryConfig::default(),
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
            updater: UpdaterConfig::default(),
            settings_file: "/data/thermae_settings.bin".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            "thermae_config.yaml",
            "/data/thermae_config.yaml",
            "/etc/thermae/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(ThermaeError::validation(
                "node_name",
                "Node name cannot be empty",
            ));
        }

        if self.meter.url.is_empty() {
            return Err(ThermaeError::validation(
                "meter.url",
                "Meter URL cannot be empty",
            ));
        }

        if self.defaults.threshold_watts <= 0 {
            return Err(ThermaeError::validation(
                "defaults.threshold_watts",
                "Threshold magnitude must be positive",
            ));
        }

        if self.defaults.interval_ms == 0 {
            return Err(ThermaeError::validation(
                "defaults.interval_ms",
                "Interval must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(ThermaeError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.telemetry.enabled && self.telemetry.host.is_empty() {
            return Err(ThermaeError::validation(
                "telemetry.host",
                "Telemetry host cannot be empty when telemetry is enabled",
            ));
        }

        Ok(())
    }
}
