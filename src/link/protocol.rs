//! # Link Protocol Constants and Types
//!
//! The device link has no framing, no checksums and no message IDs. Requests
//! are plain ASCII tokens written with their trailing NUL; the device answers
//! with newline-terminated ASCII lines or, for a settings pull, with the raw
//! 1024-byte settings blob.

use std::fmt;

/// Host-to-device command tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PullSettings,
    PushSettings,
    Reboot,
    Bootloader,
    LoadDefaults,
    FirmwareTab,
    ConfigTab,
    MotorsTab,
    FlightTab,
    LiveTab,
    Suspend,
    /// Acknowledges one live telemetry line
    LiveReceipt,
    /// Acknowledges one channel monitor line
    ChannelsReceipt,
}

impl Command {
    /// ASCII token without terminator.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Command::PullSettings => "pull_settings",
            Command::PushSettings => "push_settings",
            Command::Reboot => "reboot",
            Command::Bootloader => "bootloader",
            Command::LoadDefaults => "load_defaults",
            Command::FirmwareTab => "fw_tab",
            Command::ConfigTab => "config_tab",
            Command::MotorsTab => "motors_tab",
            Command::FlightTab => "flight_tab",
            Command::LiveTab => "live_tab",
            Command::Suspend => "suspend",
            Command::LiveReceipt => "live_receipt",
            Command::ChannelsReceipt => "channels_receipt",
        }
    }

    /// Bytes written on the wire: the token plus its trailing NUL.
    ///
    /// # Examples
    ///
    /// ```
    /// use fc_configurator::link::protocol::Command;
    ///
    /// assert_eq!(Command::PullSettings.to_wire(), b"pull_settings\0");
    /// assert_eq!(Command::PullSettings.to_wire().len(), 14);
    /// ```
    #[must_use]
    pub fn to_wire(self) -> Vec<u8> {
        nul_terminated(self.token())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Device acknowledges a push request and is ready for the blob
pub const TOKEN_OK_PUSH: &str = "ok_push";

/// Device has stored the pushed blob
pub const TOKEN_SETTINGS_RCVD: &str = "settings_rcvd";

/// Device is ready for the next motor-test line
pub const TOKEN_MOTORS_RECEIPT: &str = "motors_receipt";

/// Number of motors driven in motor-test mode
pub const MOTOR_COUNT: usize = 4;

/// Slider values for the four motors
pub type MotorValues = [u16; MOTOR_COUNT];

/// Encode a motor-test line: comma-joined values plus trailing NUL
///
/// # Examples
///
/// ```
/// use fc_configurator::link::protocol::encode_motor_values;
///
/// assert_eq!(encode_motor_values(&[0, 10, 200, 1000]), b"0,10,200,1000\0");
/// ```
#[must_use]
pub fn encode_motor_values(values: &MotorValues) -> Vec<u8> {
    let joined = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    nul_terminated(&joined)
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

/// Device operating mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Firmware,
    #[default]
    Configuration,
    MotorTest,
    FlightSetup,
    LivePlots,
    Suspended,
}

impl Mode {
    /// Command that switches the device into this mode.
    #[must_use]
    pub fn command(self) -> Command {
        match self {
            Mode::Firmware => Command::FirmwareTab,
            Mode::Configuration => Command::ConfigTab,
            Mode::MotorTest => Command::MotorsTab,
            Mode::FlightSetup => Command::FlightTab,
            Mode::LivePlots => Command::LiveTab,
            Mode::Suspended => Command::Suspend,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Firmware => "firmware",
            Mode::Configuration => "configuration",
            Mode::MotorTest => "motor test",
            Mode::FlightSetup => "flight setup",
            Mode::LivePlots => "live plots",
            Mode::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// Normalize a received line for token comparison.
///
/// Strips surrounding whitespace and any NUL padding.
#[must_use]
pub fn normalize_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_lengths() {
        // Lengths include the trailing NUL
        assert_eq!(Command::PullSettings.to_wire().len(), 14);
        assert_eq!(Command::PushSettings.to_wire().len(), 14);
        assert_eq!(Command::Reboot.to_wire().len(), 7);
        assert_eq!(Command::Bootloader.to_wire().len(), 11);
        assert_eq!(Command::LoadDefaults.to_wire().len(), 14);
    }

    #[test]
    fn test_command_wire_is_nul_terminated() {
        for cmd in [Command::FirmwareTab, Command::Suspend, Command::LiveReceipt] {
            let wire = cmd.to_wire();
            assert_eq!(wire.last(), Some(&0));
            assert_eq!(&wire[..wire.len() - 1], cmd.token().as_bytes());
        }
    }

    #[test]
    fn test_mode_commands() {
        assert_eq!(Mode::Firmware.command().token(), "fw_tab");
        assert_eq!(Mode::Configuration.command().token(), "config_tab");
        assert_eq!(Mode::MotorTest.command().token(), "motors_tab");
        assert_eq!(Mode::FlightSetup.command().token(), "flight_tab");
        assert_eq!(Mode::LivePlots.command().token(), "live_tab");
        assert_eq!(Mode::Suspended.command().token(), "suspend");
        assert_eq!(Mode::default(), Mode::Configuration);
    }

    #[test]
    fn test_encode_motor_values() {
        assert_eq!(encode_motor_values(&[0, 0, 0, 0]), b"0,0,0,0\0");
        assert_eq!(encode_motor_values(&[65535, 1, 22, 333]), b"65535,1,22,333\0");
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("ok_push\r\n"), "ok_push");
        assert_eq!(normalize_line("\0settings_rcvd\0\n"), "settings_rcvd");
        assert_eq!(normalize_line("  motors_receipt "), "motors_receipt");
    }
}
