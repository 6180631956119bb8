//! # Settings Codec
//!
//! Packs [`Settings`] into the 1024-byte wire blob and unpacks it again.
//!
//! Decoding checks the magic byte and nothing else: numeric ranges are the
//! device's business. A blob with a wrong magic byte is rejected as a whole
//! and never partially applied.

use super::layout::*;
use super::{Motor, PidGains, ReceiverProtocol, Settings, NUM_MOTORS};
use crate::error::{ConfiguratorError, Result};
use crate::orientation::{OrientationMatrix, RawMatrix};
use crate::rc::{RcBinding, RcMapping, RC_SLOTS};

/// Encode settings into a complete blob
///
/// # Arguments
///
/// * `settings` - Settings to serialize
///
/// # Returns
///
/// * `SettingsBlob` - 1024 bytes, magic first, padding and reserved bytes zero
///
/// # Examples
///
/// ```
/// use fc_configurator::settings::{encode, Settings, SETTINGS_MAGIC};
///
/// let blob = encode(&Settings::default());
/// assert_eq!(blob.len(), 1024);
/// assert_eq!(blob[0], SETTINGS_MAGIC);
/// ```
#[must_use]
pub fn encode(settings: &Settings) -> SettingsBlob {
    let mut blob = [0u8; SETTINGS_BLOB_LEN];

    blob[OFFSET_MAGIC] = SETTINGS_MAGIC;
    put_f32s(&mut blob, OFFSET_PID, &settings.pid.to_array());
    put_f32s(&mut blob, OFFSET_PID_LOW, &settings.pid_low.to_array());
    put_f32s(&mut blob, OFFSET_RATE, &settings.rate);

    for (i, motor) in settings.motors.iter().enumerate() {
        let at = OFFSET_MOTORS + i * MOTOR_SIZE;
        blob[at] = motor.direction as u8;
        blob[at + 1] = motor.timer_channel;
    }

    for (i, row) in settings.orientation.rows().iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            blob[OFFSET_ORIENTATION + i * 3 + j] = v as u8;
        }
    }

    put_f32s(&mut blob, OFFSET_ASPECT_RATIO, &[settings.aspect_ratio]);

    for (i, binding) in settings.rc.slots().iter().enumerate() {
        let at = OFFSET_RC + i * RC_BINDING_SIZE;
        blob[at] = binding.channel;
        blob[at + 1] = u8::from(binding.reversed);
    }

    blob[OFFSET_RECEIVER] = settings.receiver.to_u8();
    blob
}

/// Decode a received blob
///
/// # Arguments
///
/// * `blob` - Raw bytes, must be exactly 1024 long and start with the magic byte
///
/// # Returns
///
/// * `Result<Settings>` - Decoded settings
///
/// # Errors
///
/// Returns error if:
/// - The first byte is not [`SETTINGS_MAGIC`] (checked before anything else)
/// - The buffer is not exactly [`SETTINGS_BLOB_LEN`] bytes
pub fn decode(blob: &[u8]) -> Result<Settings> {
    match blob.first() {
        Some(&SETTINGS_MAGIC) => {}
        Some(&found) => return Err(ConfiguratorError::InvalidMagic { found }),
        None => {
            return Err(ConfiguratorError::BlobLength {
                expected: SETTINGS_BLOB_LEN,
                actual: 0,
            })
        }
    }

    if blob.len() != SETTINGS_BLOB_LEN {
        return Err(ConfiguratorError::BlobLength {
            expected: SETTINGS_BLOB_LEN,
            actual: blob.len(),
        });
    }

    let motors: [Motor; NUM_MOTORS] = std::array::from_fn(|i| {
        let at = OFFSET_MOTORS + i * MOTOR_SIZE;
        Motor {
            direction: blob[at] as i8,
            timer_channel: blob[at + 1],
        }
    });

    let rows: RawMatrix = std::array::from_fn(|i| {
        std::array::from_fn(|j| blob[OFFSET_ORIENTATION + i * 3 + j] as i8)
    });

    let slots: [RcBinding; RC_SLOTS] = std::array::from_fn(|i| {
        let at = OFFSET_RC + i * RC_BINDING_SIZE;
        RcBinding {
            channel: blob[at],
            reversed: blob[at + 1] != 0,
        }
    });

    Ok(Settings {
        pid: PidGains::from_array(get_f32s(blob, OFFSET_PID)),
        pid_low: PidGains::from_array(get_f32s(blob, OFFSET_PID_LOW)),
        rate: get_f32s(blob, OFFSET_RATE),
        motors,
        orientation: OrientationMatrix::from_rows_unchecked(rows),
        aspect_ratio: get_f32s::<1>(blob, OFFSET_ASPECT_RATIO)[0],
        rc: RcMapping::from_slots(slots),
        receiver: ReceiverProtocol::from_u8(blob[OFFSET_RECEIVER]),
    })
}

fn put_f32s(blob: &mut [u8], offset: usize, values: &[f32]) {
    for (i, v) in values.iter().enumerate() {
        let at = offset + i * 4;
        blob[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

fn get_f32s<const N: usize>(blob: &[u8], offset: usize) -> [f32; N] {
    std::array::from_fn(|i| {
        let at = offset + i * 4;
        f32::from_le_bytes([blob[at], blob[at + 1], blob[at + 2], blob[at + 3]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{Axis, Sign};
    use crate::rc::RcFunction;
    use crate::settings::{Pid, PropRotation};

    fn sample_settings() -> Settings {
        let mut s = Settings::default();
        s.pid.roll = Pid { kp: 1.25, ki: 0.5, kd: 0.03 };
        s.pid.nick = Pid { kp: 1.5, ki: 0.25, kd: 0.04 };
        s.pid.yaw = Pid { kp: 3.0, ki: 0.1, kd: 0.0 };
        s.pid_low.roll.kp = 0.75;
        s.pid_low.yaw.kd = -0.5;
        s.rate = [250.0, 250.0, 180.0];
        s.motors[2].timer_channel = 7;
        s.set_prop_rotation(PropRotation::Reversed);
        s.orientation = s
            .orientation
            .rotate(Axis::Y, Sign::Minus)
            .rotate(Axis::Z, Sign::Plus);
        s.aspect_ratio = 1.33;
        s.rc.set_channel(RcFunction::Arm, 9);
        s.rc.set_channel(RcFunction::Aux2, 9);
        s.rc.toggle_reverse(RcFunction::Arm);
        s.rc.set_channel(RcFunction::Aux3, 0);
        s.receiver = ReceiverProtocol::Srxl;
        s
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let settings = sample_settings();
        let decoded = decode(&encode(&settings)).unwrap();
        assert_eq!(decoded, settings);
        assert!(decoded.orientation.is_valid());
        assert!(decoded.rc.binding(RcFunction::Aux2).reversed);
    }

    #[test]
    fn test_encode_field_offsets() {
        let settings = sample_settings();
        let blob = encode(&settings);

        assert_eq!(blob[0], SETTINGS_MAGIC);
        assert_eq!(&blob[1..4], &[0, 0, 0]);
        assert_eq!(&blob[4..8], &1.25f32.to_le_bytes());
        assert_eq!(&blob[108..112], &1.33f32.to_le_bytes());

        // Motor 1 reversed scheme: CW, timer channel 1
        assert_eq!(blob[88], 1);
        assert_eq!(blob[89], 1);
        // Motor 2: CCW stored as two's complement
        assert_eq!(blob[90], 0xFF);

        // Arm slot (5) bound to 9, reversed
        assert_eq!(blob[112 + 5 * 2], 9);
        assert_eq!(blob[112 + 5 * 2 + 1], 1);

        assert_eq!(blob[138], 1);
        assert!(blob[PAYLOAD_LEN - 1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        let mut blob = encode(&sample_settings());
        blob[0] = 0x00;
        match decode(&blob) {
            Err(ConfiguratorError::InvalidMagic { found }) => assert_eq!(found, 0x00),
            other => panic!("Expected InvalidMagic, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_wrong_magic_regardless_of_content() {
        for first in [0x00u8, 0x01, 0xDA, 0xDC, 0xFF] {
            let mut blob = [SETTINGS_MAGIC; SETTINGS_BLOB_LEN];
            blob[0] = first;
            assert!(matches!(
                decode(&blob),
                Err(ConfiguratorError::InvalidMagic { .. })
            ));
        }
        // Wrong magic wins over wrong length
        assert!(matches!(
            decode(&[0x42u8; 10]),
            Err(ConfiguratorError::InvalidMagic { found: 0x42 })
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let blob = encode(&sample_settings());
        assert!(matches!(
            decode(&blob[..1023]),
            Err(ConfiguratorError::BlobLength { expected: 1024, actual: 1023 })
        ));
        assert!(matches!(
            decode(&[]),
            Err(ConfiguratorError::BlobLength { actual: 0, .. })
        ));
    }

    #[test]
    fn test_decode_ignores_padding_and_reserved() {
        let settings = sample_settings();
        let mut blob = encode(&settings);
        blob[1] = 0xAA;
        blob[2] = 0x55;
        blob[105] = 0x11;
        blob[139] = 0x22;
        for b in blob[PAYLOAD_LEN..].iter_mut() {
            *b = 0xEE;
        }
        assert_eq!(decode(&blob).unwrap(), settings);
    }

    #[test]
    fn test_decode_does_not_validate_ranges() {
        let mut blob = encode(&Settings::default());
        blob[OFFSET_RECEIVER] = 9;
        blob[OFFSET_ORIENTATION] = 5;
        let settings = decode(&blob).unwrap();
        assert_eq!(settings.receiver, ReceiverProtocol::Unknown(9));
        assert!(!settings.orientation.is_valid());
    }
}
