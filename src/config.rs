//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [serial]
//! port = ""                # empty = auto-detect
//! baud_rate = 115200
//!
//! [link]
//! tick_interval_ms = 100
//! quiet_gate_ms = 150
//! sample_interval_ms = 10
//!
//! [channels]
//! low_threshold = 1400
//! high_threshold = 2700
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfiguratorError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub firmware: FirmwareConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_usb_manufacturer")]
    pub usb_manufacturer: String,

    #[serde(default = "default_usb_product_id")]
    pub usb_product_id: u16,
}

/// Link session timing
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Period of the main tick (push writes, status refresh)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Delay after `pull_settings` before incoming bytes count as settings data.
    ///
    /// The device stops streaming within ~20 ms of the request and starts
    /// sending the blob after more than 300 ms, so the gate must open in
    /// between.
    #[serde(default = "default_quiet_gate_ms")]
    pub quiet_gate_ms: u64,

    /// Period of the live-plot sampling tick
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Longest telemetry line kept while waiting for its newline
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

/// Channel display thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u16,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: u16,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub record: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_plot_history")]
    pub plot_history: usize,
}

/// Firmware flashing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FirmwareConfig {
    #[serde(default = "default_dfu_util")]
    pub dfu_util: String,

    #[serde(default = "default_flash_address")]
    pub flash_address: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file, stderr only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_baud_rate() -> u32 { 115_200 }
fn default_usb_manufacturer() -> String { "STMicroelectronics".to_string() }
fn default_usb_product_id() -> u16 { 0x5740 }

fn default_tick_interval_ms() -> u64 { 100 }
fn default_quiet_gate_ms() -> u64 { 150 }
fn default_sample_interval_ms() -> u64 { 10 }
fn default_max_line_len() -> usize { 128 }

fn default_low_threshold() -> u16 { 1400 }
fn default_high_threshold() -> u16 { 2700 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_plot_history() -> usize { 1000 }

fn default_dfu_util() -> String { "dfu-util".to_string() }
fn default_flash_address() -> String { "0x08004000".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            usb_manufacturer: default_usb_manufacturer(),
            usb_product_id: default_usb_product_id(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            quiet_gate_ms: default_quiet_gate_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            max_line_len: default_max_line_len(),
        }
    }
}

impl LinkConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn quiet_gate(&self) -> Duration {
        Duration::from_millis(self.quiet_gate_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            record: false,
            log_dir: default_log_dir(),
            plot_history: default_plot_history(),
        }
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            dfu_util: default_dfu_util(),
            flash_address: default_flash_address(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> ConfiguratorError {
    ConfiguratorError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
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
    /// use fc_configurator::config::Config;
    ///
    /// let config = Config::load("fc-configurator.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if ![9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600]
            .contains(&self.serial.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.usb_manufacturer.is_empty() {
            return Err(invalid("usb_manufacturer cannot be empty"));
        }

        if self.link.tick_interval_ms == 0 || self.link.tick_interval_ms > 1000 {
            return Err(invalid("tick_interval_ms must be between 1 and 1000"));
        }

        // The device starts sending the blob after > 300 ms
        if self.link.quiet_gate_ms == 0 || self.link.quiet_gate_ms >= 300 {
            return Err(invalid("quiet_gate_ms must be between 1 and 299"));
        }

        if self.link.sample_interval_ms == 0 || self.link.sample_interval_ms > 1000 {
            return Err(invalid("sample_interval_ms must be between 1 and 1000"));
        }

        if self.link.max_line_len < 64 || self.link.max_line_len > 4096 {
            return Err(invalid("max_line_len must be between 64 and 4096"));
        }

        if self.channels.low_threshold >= self.channels.high_threshold {
            return Err(invalid("low_threshold must be less than high_threshold"));
        }

        if self.telemetry.record && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when recording"));
        }

        if self.telemetry.plot_history == 0 {
            return Err(invalid("plot_history must be greater than 0"));
        }

        if self.firmware.dfu_util.is_empty() {
            return Err(invalid("dfu_util cannot be empty"));
        }

        let addr = self.firmware.flash_address.trim_start_matches("0x");
        if addr.len() == self.firmware.flash_address.len() || u32::from_str_radix(addr, 16).is_err() {
            return Err(invalid(format!(
                "flash_address '{}' must be a hex address like 0x08004000",
                self.firmware.flash_address
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM3"

[link]
quiet_gate_ms = 200

[channels]
high_threshold = 1900
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM3");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.link.quiet_gate_ms, 200);
        assert_eq!(config.link.tick_interval_ms, 100);
        assert_eq!(config.channels.low_threshold, 1400);
        assert_eq!(config.channels.high_threshold, 1900);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert!(config.serial.port.is_empty());
        assert_eq!(config.firmware.dfu_util, "dfu-util");
        assert!(config.logging.file_dir.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[link\nquiet_gate_ms = ").unwrap();
        assert!(matches!(
            Config::load(temp_file.path()),
            Err(ConfiguratorError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quiet_gate_zero() {
        let mut config = Config::default();
        config.link.quiet_gate_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quiet_gate_must_open_before_device_sends() {
        let mut config = Config::default();
        config.link.quiet_gate_ms = 300;
        assert!(config.validate().is_err());
        config.link.quiet_gate_ms = 299;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_interval_out_of_range() {
        let mut config = Config::default();
        config.link.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.link.tick_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_interval_zero() {
        let mut config = Config::default();
        config.link.sample_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_line_len_too_small() {
        let mut config = Config::default();
        config.link.max_line_len = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_inverted() {
        let mut config = Config::default();
        config.channels.low_threshold = 2000;
        config.channels.high_threshold = 1500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_equal() {
        let mut config = Config::default();
        config.channels.low_threshold = 1500;
        config.channels.high_threshold = 1500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_recording() {
        let mut config = Config::default();
        config.telemetry.record = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_not_recording() {
        let mut config = Config::default();
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plot_history_zero() {
        let mut config = Config::default();
        config.telemetry.plot_history = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flash_address_format() {
        let mut config = Config::default();
        config.firmware.flash_address = "08004000".to_string();
        assert!(config.validate().is_err());
        config.firmware.flash_address = "0xZZ".to_string();
        assert!(config.validate().is_err());
        config.firmware.flash_address = "0x08000000".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let link = LinkConfig::default();
        assert_eq!(link.tick_interval(), Duration::from_millis(100));
        assert_eq!(link.quiet_gate(), Duration::from_millis(150));
        assert_eq!(link.sample_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_baud_rate(), 115_200);
        assert_eq!(default_usb_manufacturer(), "STMicroelectronics");
        assert_eq!(default_usb_product_id(), 0x5740);
        assert_eq!(default_tick_interval_ms(), 100);
        assert_eq!(default_quiet_gate_ms(), 150);
        assert_eq!(default_sample_interval_ms(), 10);
        assert_eq!(default_max_line_len(), 128);
        assert_eq!(default_low_threshold(), 1400);
        assert_eq!(default_high_threshold(), 2700);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_plot_history(), 1000);
        assert_eq!(default_dfu_util(), "dfu-util");
        assert_eq!(default_flash_address(), "0x08004000");
    }
}
