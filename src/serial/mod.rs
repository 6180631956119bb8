//! # Serial Communication Module
//!
//! Handles the USB CDC serial link to the flight controller.
//!
//! This module handles:
//! - Discovering the flight controller among the available ports
//! - Opening the port at 115,200 baud, 8N1, no flow control
//! - Non-blocking, bounded reads and writes for the link session
//! - Readiness-driven async reads for the event loop

pub mod port_trait;

pub use port_trait::SerialLink;

use std::io;

use crate::config::SerialConfig;
use crate::error::{ConfiguratorError, Result};
use tokio::io::AsyncReadExt;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialPortType};
use tracing::{debug, info, warn};

/// Link baud rate expected by the flight controller firmware
pub const DEVICE_BAUD_RATE: u32 = 115_200;

/// Fallback device paths to try when discovery finds nothing (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (the flight controller enumerates as one)
    "/dev/ttyACM1",
];

/// A serial port seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// System path, e.g. /dev/ttyACM0
    pub path: String,
    /// USB manufacturer and product id match the flight controller
    pub is_flight_controller: bool,
    /// Human readable description
    pub description: String,
}

/// List available ports, flight controllers first.
///
/// # Errors
///
/// Returns error if the OS port enumeration fails
pub fn discover(config: &SerialConfig) -> Result<Vec<PortCandidate>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| ConfiguratorError::Serial(format!("Failed to list ports: {}", e)))?;

    let mut candidates: Vec<PortCandidate> = ports
        .into_iter()
        .map(|port| {
            let (is_flight_controller, description) = match &port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let manufacturer = usb.manufacturer.clone().unwrap_or_default();
                    let matches = manufacturer == config.usb_manufacturer
                        && usb.pid == config.usb_product_id;
                    (
                        matches,
                        format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, manufacturer),
                    )
                }
                SerialPortType::PciPort => (false, "PCI".to_string()),
                SerialPortType::BluetoothPort => (false, "Bluetooth".to_string()),
                SerialPortType::Unknown => (false, "Unknown".to_string()),
            };
            PortCandidate {
                path: port.port_name,
                is_flight_controller,
                description,
            }
        })
        .collect();

    // Stable sort keeps the OS order within each group
    candidates.sort_by_key(|c| !c.is_flight_controller);
    debug!("Discovered {} serial ports", candidates.len());
    Ok(candidates)
}

/// Flight controller serial port handler
///
/// Wraps a `tokio_serial::SerialStream` and exposes it as a [`SerialLink`].
pub struct DeviceSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for DeviceSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl DeviceSerial {
    /// Open connection to the flight controller
    ///
    /// Uses `config.port` when set; otherwise the first discovered flight
    /// controller, then the fallback paths.
    ///
    /// # Errors
    ///
    /// Returns error if no device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fc_configurator::config::SerialConfig;
    /// use fc_configurator::serial::DeviceSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = DeviceSerial::open(&SerialConfig::default())?;
    ///     println!("{}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        if !config.port.is_empty() {
            return Self::open_with_paths(&[config.port.as_str()], config.baud_rate);
        }

        let discovered: Vec<String> = match discover(config) {
            Ok(candidates) => candidates
                .into_iter()
                .filter(|c| c.is_flight_controller)
                .map(|c| c.path)
                .collect(),
            Err(e) => {
                warn!("Port discovery failed: {}", e);
                Vec::new()
            }
        };

        let mut paths: Vec<&str> = discovered.iter().map(String::as_str).collect();
        paths.extend(
            DEFAULT_DEVICE_PATHS
                .iter()
                .filter(|p| !discovered.iter().any(|d| d.as_str() == **p)),
        );
        Self::open_with_paths(&paths, config.baud_rate)
    }

    /// Open connection with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try, in order
    /// * `baud_rate` - Link baud rate
    ///
    /// # Returns
    ///
    /// * `Result<DeviceSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened flight controller at {}", path);
                    return Ok(Self::from_stream(port, *path));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(ConfiguratorError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port, 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| ConfiguratorError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Wrap an already opened stream
    pub fn from_stream(port: tokio_serial::SerialStream, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
        }
    }

    /// Wait for bytes and read whatever is available, up to `buf.len()`.
    ///
    /// Readiness is cleared when the port runs dry, so the next call sleeps
    /// until new bytes arrive. Dropping the future loses no data.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the port fails
    pub async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl SerialLink for DeviceSerial {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.try_read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_some(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.port.try_write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
