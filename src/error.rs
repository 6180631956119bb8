//! # Error Types
//!
//! Custom error types for the flight controller configurator using `thiserror`.

use thiserror::Error;

/// Main error type for the configurator
#[derive(Debug, Error)]
pub enum ConfiguratorError {
    /// No usable serial device could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// The link is closed
    #[error("Not connected")]
    NotConnected,

    /// A settings pull or push is still in flight
    #[error("Settings transfer in progress")]
    TransferInProgress,

    /// Settings blob does not start with the magic byte
    #[error("Invalid settings magic byte: 0x{found:02X}")]
    InvalidMagic { found: u8 },

    /// Settings blob has the wrong size
    #[error("Invalid settings blob length: expected {expected} bytes, got {actual}")]
    BlobLength { expected: usize, actual: usize },

    /// Firmware flashing errors
    #[error("Firmware error: {0}")]
    Firmware(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the configurator
pub type Result<T> = std::result::Result<T, ConfiguratorError>;
