//! # Settings Module
//!
//! Typed representation of the flight controller's persistent configuration
//! and its fixed-layout binary form.
//!
//! This module handles:
//! - The decoded [`Settings`] record exchanged with the device
//! - Packing/unpacking the 1024-byte settings blob ([`codec`])
//! - Blob byte offsets and the magic sentinel ([`layout`])
//! - Byte-exact persistence of a blob to disk ([`store`])

pub mod codec;
pub mod layout;
pub mod store;

use crate::orientation::OrientationMatrix;
use crate::rc::RcMapping;

pub use codec::{decode, encode};
pub use layout::{SettingsBlob, SETTINGS_BLOB_LEN, SETTINGS_MAGIC};

/// Motor rotational direction value for clockwise
pub const CW: i8 = 1;

/// Motor rotational direction value for counter-clockwise
pub const CCW: i8 = -1;

/// Number of motors on the vehicle
pub const NUM_MOTORS: usize = 4;

/// Gains of a single PID controller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pid {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Roll / nick / yaw PID gains.
///
/// Wire order is `roll kp ki kd, nick kp ki kd, yaw kp ki kd`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidGains {
    pub roll: Pid,
    pub nick: Pid,
    pub yaw: Pid,
}

impl PidGains {
    /// Flattens the gains into wire order.
    #[must_use]
    pub fn to_array(&self) -> [f32; 9] {
        let [r, n, y] = [self.roll, self.nick, self.yaw];
        [r.kp, r.ki, r.kd, n.kp, n.ki, n.kd, y.kp, y.ki, y.kd]
    }

    /// Builds gains from wire order.
    #[must_use]
    pub fn from_array(v: [f32; 9]) -> Self {
        Self {
            roll: Pid { kp: v[0], ki: v[1], kd: v[2] },
            nick: Pid { kp: v[3], ki: v[4], kd: v[5] },
            yaw: Pid { kp: v[6], ki: v[7], kd: v[8] },
        }
    }
}

/// Per-motor output descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motor {
    /// Timer output channel driving this motor
    pub timer_channel: u8,
    /// [`CW`] or [`CCW`]
    pub direction: i8,
}

/// Propeller rotation scheme selected by the user.
///
/// The four motor directions are always derived from this single choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropRotation {
    /// Motor 1 CCW, motor 2 CW, motor 3 CW, motor 4 CCW
    Normal,
    /// Motor 1 CW, motor 2 CCW, motor 3 CCW, motor 4 CW
    Reversed,
}

impl PropRotation {
    /// Direction of each motor under this scheme.
    #[must_use]
    pub fn motor_directions(self) -> [i8; NUM_MOTORS] {
        match self {
            PropRotation::Normal => [CCW, CW, CW, CCW],
            PropRotation::Reversed => [CW, CCW, CCW, CW],
        }
    }
}

/// Receiver serial protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverProtocol {
    Sbus,
    Srxl,
    /// Value not known to this tool; kept so it round-trips untouched
    Unknown(u8),
}

impl ReceiverProtocol {
    /// Wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            ReceiverProtocol::Sbus => 0,
            ReceiverProtocol::Srxl => 1,
            ReceiverProtocol::Unknown(v) => v,
        }
    }

    /// Parses a wire value.
    #[must_use]
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => ReceiverProtocol::Sbus,
            1 => ReceiverProtocol::Srxl,
            other => ReceiverProtocol::Unknown(other),
        }
    }
}

/// Decoded device configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Normal PID gain set
    pub pid: PidGains,
    /// Low PID gain set
    pub pid_low: PidGains,
    /// Roll / nick / yaw rate scalars
    pub rate: [f32; 3],
    pub motors: [Motor; NUM_MOTORS],
    pub orientation: OrientationMatrix,
    pub aspect_ratio: f32,
    pub rc: RcMapping,
    pub receiver: ReceiverProtocol,
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            pid: PidGains::default(),
            pid_low: PidGains::default(),
            rate: [0.0; 3],
            motors: [Motor { timer_channel: 0, direction: CW }; NUM_MOTORS],
            orientation: OrientationMatrix::identity(),
            aspect_ratio: 1.0,
            rc: RcMapping::conventional(),
            receiver: ReceiverProtocol::Sbus,
        };
        for (i, motor) in settings.motors.iter_mut().enumerate() {
            motor.timer_channel = i as u8 + 1;
        }
        settings.set_prop_rotation(PropRotation::Normal);
        settings
    }
}

impl Settings {
    /// Rotation scheme, read back from motor 2.
    #[must_use]
    pub fn prop_rotation(&self) -> PropRotation {
        if self.motors[1].direction == CW {
            PropRotation::Normal
        } else {
            PropRotation::Reversed
        }
    }

    /// Rewrites all four motor directions from a rotation scheme.
    pub fn set_prop_rotation(&mut self, rotation: PropRotation) {
        for (motor, dir) in self.motors.iter_mut().zip(rotation.motor_directions()) {
            motor.direction = dir;
        }
    }
}
