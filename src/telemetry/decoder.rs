//! # Telemetry Line Decoder
//!
//! Parses the ASCII lines the device streams while the flight-setup or live
//! tab is active. Values are passed through untouched apart from the
//! radian-to-degree conversion of the attitude angles.
//!
//! ## Line formats
//!
//! | Mode | Fields | Content |
//! |------|--------|---------|
//! | Channel monitor | 12 integers | raw receiver pulse widths |
//! | Live telemetry | 9 floats | accel x/y/z, gyro x/y/z, angle x/y/z (radians) |

use serde::Serialize;

use crate::rc::{RcChannels, NUM_RC_CHANNELS};

/// Number of fields in a live telemetry line
pub const LIVE_FIELDS: usize = 9;

/// Index of the first attitude-angle field
pub const ANGLE_FIELDS_START: usize = 6;

/// Default threshold below which a channel reads "low"
pub const DEFAULT_LOW_THRESHOLD: u16 = 1400;

/// Default threshold above which a channel reads "high"
pub const DEFAULT_HIGH_THRESHOLD: u16 = 2700;

/// Live sensor vector: accel[3], gyro[3], angles in degrees[3]
pub type LiveVector = [f64; LIVE_FIELDS];

/// One decoded live telemetry sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LiveSample {
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
    /// Attitude angles in degrees
    pub angle: [f64; 3],
}

impl From<LiveVector> for LiveSample {
    fn from(v: LiveVector) -> Self {
        Self {
            accel: [v[0], v[1], v[2]],
            gyro: [v[3], v[4], v[5]],
            angle: [v[6], v[7], v[8]],
        }
    }
}

/// Three-way reading of a channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    Middle,
    High,
}

/// Parse a channel monitor line
///
/// # Arguments
///
/// * `line` - One line from the device, trailing whitespace allowed
///
/// # Returns
///
/// * `Option<RcChannels>` - 12 channel values, or `None` if the line does not
///   hold exactly 12 space-separated integers
///
/// # Examples
///
/// ```
/// use fc_configurator::telemetry::decoder::parse_channels;
///
/// let ch = parse_channels("1000 1500 2000 1500 1000 1000 1000 1000 1000 1000 1000 1000\n");
/// assert_eq!(ch.unwrap()[2], 2000);
/// assert!(parse_channels("1000 1500").is_none());
/// ```
#[must_use]
pub fn parse_channels(line: &str) -> Option<RcChannels> {
    let values = parse_fields::<u16>(line, NUM_RC_CHANNELS)?;
    values.try_into().ok()
}

/// Parse a live telemetry line
///
/// Fields 6-8 are converted from radians to degrees.
///
/// # Arguments
///
/// * `line` - One line from the device
///
/// # Returns
///
/// * `Option<LiveVector>` - 9 values, or `None` if the line does not hold
///   exactly 9 space-separated numbers
#[must_use]
pub fn parse_live(line: &str) -> Option<LiveVector> {
    let values = parse_fields::<f64>(line, LIVE_FIELDS)?;
    let mut out: LiveVector = values.try_into().ok()?;
    for angle in &mut out[ANGLE_FIELDS_START..] {
        *angle = angle.to_degrees();
    }
    Some(out)
}

fn parse_fields<T: std::str::FromStr>(line: &str, expected: usize) -> Option<Vec<T>> {
    let tokens: Vec<&str> = line.trim().split(' ').collect();
    if tokens.len() != expected {
        return None;
    }
    tokens.iter().map(|t| t.parse::<T>().ok()).collect()
}

/// Bucket a channel value into low / middle / high
///
/// `value < low` is [`Level::Low`], `value > high` is [`Level::High`],
/// everything else is [`Level::Middle`].
///
/// # Examples
///
/// ```
/// use fc_configurator::telemetry::decoder::{classify, Level};
///
/// assert_eq!(classify(1399, 1400, 2700), Level::Low);
/// assert_eq!(classify(1400, 1400, 2700), Level::Middle);
/// assert_eq!(classify(2701, 1400, 2700), Level::High);
/// ```
#[must_use]
pub fn classify(value: u16, low: u16, high: u16) -> Level {
    if value < low {
        Level::Low
    } else if value > high {
        Level::High
    } else {
        Level::Middle
    }
}

/// Whether an arm switch value reads "armed" (above the high threshold only).
#[must_use]
pub fn is_armed(value: u16, high: u16) -> bool {
    value > high
}
