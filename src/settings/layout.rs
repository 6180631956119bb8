//! # Settings Blob Layout
//!
//! Byte offsets of the packed settings record, matching the device's C struct
//! with native (4-byte float) alignment on a little-endian MCU:
//!
//! ```text
//! Offset  Size  Field
//!      0     1  magic (0xDB)
//!      1     3  padding
//!      4    36  pid[9]          f32
//!     40    36  pid_low[9]      f32
//!     76    12  rate[3]         f32
//!     88     8  motor[4]        { i8 rotational_direction, u8 timer_channel }
//!     96     9  orientation     i8[3][3], row-major
//!    105     3  padding
//!    108     4  aspect_ratio    f32
//!    112    26  rc[13]          { u8 channel, u8 reversed }
//!    138     1  receiver        u8 (0 = SBUS, 1 = SRXL)
//!    139     1  tail padding
//!    140   884  reserved, zero on encode, ignored on decode
//! ```

/// Total size of a settings transfer on the wire
pub const SETTINGS_BLOB_LEN: usize = 1024;

/// First byte of every valid settings blob
pub const SETTINGS_MAGIC: u8 = 0xDB;

/// Fixed-size settings blob
pub type SettingsBlob = [u8; SETTINGS_BLOB_LEN];

pub const OFFSET_MAGIC: usize = 0;
pub const OFFSET_PID: usize = 4;
pub const OFFSET_PID_LOW: usize = 40;
pub const OFFSET_RATE: usize = 76;
pub const OFFSET_MOTORS: usize = 88;
pub const OFFSET_ORIENTATION: usize = 96;
pub const OFFSET_ASPECT_RATIO: usize = 108;
pub const OFFSET_RC: usize = 112;
pub const OFFSET_RECEIVER: usize = 138;

/// Bytes per motor descriptor
pub const MOTOR_SIZE: usize = 2;

/// Bytes per RC binding
pub const RC_BINDING_SIZE: usize = 2;

/// Size of the C struct including tail padding
pub const PAYLOAD_LEN: usize = 140;
