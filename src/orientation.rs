//! # Sensor Orientation Module
//!
//! Discrete 90° rotation algebra for the IMU mounting orientation.
//!
//! The orientation is a 3×3 signed permutation matrix. Rows are the physical
//! sensor axes (X, Y, Z), columns are the vehicle axes (Front, Left, Top):
//!
//! ```text
//!        Front  Left  Top
//!   x  [   1     0     0 ]
//!   y  [   0     1     0 ]
//!   z  [   0     0     1 ]
//! ```
//!
//! The identity means the sensor is mounted with +X to the front, +Y to the
//! left and +Z to the top. The matrix is only ever changed by composing it with
//! one of six 90° generators, so it stays a signed permutation.
//!
//! ## Usage
//!
//! ```
//! use fc_configurator::orientation::{Axis, OrientationMatrix, Sign};
//!
//! let m = OrientationMatrix::identity()
//!     .rotate(Axis::Z, Sign::Plus)
//!     .rotate(Axis::Z, Sign::Minus);
//! assert_eq!(m, OrientationMatrix::identity());
//! ```

use std::fmt;
use std::str::FromStr;

/// Raw 3×3 matrix as stored in the settings blob (row-major).
pub type RawMatrix = [[i8; 3]; 3];

const ROT_X_PLUS: RawMatrix = [[1, 0, 0], [0, 0, -1], [0, 1, 0]];
const ROT_X_MINUS: RawMatrix = [[1, 0, 0], [0, 0, 1], [0, -1, 0]];
const ROT_Y_PLUS: RawMatrix = [[0, 0, 1], [0, 1, 0], [-1, 0, 0]];
const ROT_Y_MINUS: RawMatrix = [[0, 0, -1], [0, 1, 0], [1, 0, 0]];
const ROT_Z_PLUS: RawMatrix = [[0, -1, 0], [1, 0, 0], [0, 0, 1]];
const ROT_Z_MINUS: RawMatrix = [[0, 1, 0], [-1, 0, 0], [0, 0, 1]];

/// Rotation axis of a 90° generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Rotation direction of a 90° generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Plus,
    Minus,
}

/// One of the six canonical 90° rotations, parsed from `x+`, `y-`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub axis: Axis,
    pub sign: Sign,
}

impl Rotation {
    /// All six generators in a fixed order.
    pub const ALL: [Rotation; 6] = [
        Rotation { axis: Axis::X, sign: Sign::Plus },
        Rotation { axis: Axis::X, sign: Sign::Minus },
        Rotation { axis: Axis::Y, sign: Sign::Plus },
        Rotation { axis: Axis::Y, sign: Sign::Minus },
        Rotation { axis: Axis::Z, sign: Sign::Plus },
        Rotation { axis: Axis::Z, sign: Sign::Minus },
    ];

    fn generator(self) -> &'static RawMatrix {
        match (self.axis, self.sign) {
            (Axis::X, Sign::Plus) => &ROT_X_PLUS,
            (Axis::X, Sign::Minus) => &ROT_X_MINUS,
            (Axis::Y, Sign::Plus) => &ROT_Y_PLUS,
            (Axis::Y, Sign::Minus) => &ROT_Y_MINUS,
            (Axis::Z, Sign::Plus) => &ROT_Z_PLUS,
            (Axis::Z, Sign::Minus) => &ROT_Z_MINUS,
        }
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let mut chars = s.chars();
        let axis = match chars.next() {
            Some('x') => Axis::X,
            Some('y') => Axis::Y,
            Some('z') => Axis::Z,
            _ => return Err(format!("invalid rotation '{}': axis must be x, y or z", s)),
        };
        let sign = match (chars.next(), chars.next()) {
            (Some('+'), None) => Sign::Plus,
            (Some('-'), None) => Sign::Minus,
            _ => return Err(format!("invalid rotation '{}': expected e.g. x+ or z-", s)),
        };
        Ok(Rotation { axis, sign })
    }
}

/// Vehicle axis, i.e. a column of the orientation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleAxis {
    Front,
    Left,
    Top,
}

impl VehicleAxis {
    const ALL: [VehicleAxis; 3] = [VehicleAxis::Front, VehicleAxis::Left, VehicleAxis::Top];

    /// Label drawn next to the arrow for this axis.
    pub fn label(self) -> char {
        match self {
            VehicleAxis::Front => 'X',
            VehicleAxis::Left => 'Y',
            VehicleAxis::Top => 'Z',
        }
    }
}

/// Displayed direction of a vehicle axis on the sensor sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Top,
    Bottom,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Top => "top",
            Direction::Bottom => "bottom",
        };
        f.write_str(s)
    }
}

/// Where one vehicle axis points in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisView {
    /// Vehicle axis (matrix column)
    pub vehicle: VehicleAxis,
    /// Physical sensor axis carrying it (matrix row)
    pub sensor: Axis,
    /// Sign of the single nonzero entry
    pub positive: bool,
    /// Direction for display
    pub direction: Direction,
}

/// Sensor mounting orientation as a 3×3 signed permutation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationMatrix(RawMatrix);

impl Default for OrientationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl OrientationMatrix {
    /// Sensor mounted in the reference orientation.
    #[must_use]
    pub fn identity() -> Self {
        Self([[1, 0, 0], [0, 1, 0], [0, 0, 1]])
    }

    /// Builds a matrix from raw rows, accepting only signed permutations.
    #[must_use]
    pub fn from_rows(rows: RawMatrix) -> Option<Self> {
        if is_signed_permutation(&rows) {
            Some(Self(rows))
        } else {
            None
        }
    }

    /// Builds a matrix from rows received in a settings blob.
    ///
    /// The device is trusted; the rows are not checked here.
    pub(crate) fn from_rows_unchecked(rows: RawMatrix) -> Self {
        Self(rows)
    }

    /// Raw rows, as written into the settings blob.
    #[must_use]
    pub fn rows(&self) -> &RawMatrix {
        &self.0
    }

    /// Whether the matrix is a signed permutation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_signed_permutation(&self.0)
    }

    /// Composes the orientation with a 90° rotation: `self × R`.
    ///
    /// # Arguments
    ///
    /// * `axis` - Rotation axis
    /// * `sign` - Rotation direction
    ///
    /// # Returns
    ///
    /// The rotated orientation. Integer arithmetic only.
    #[must_use]
    pub fn rotate(&self, axis: Axis, sign: Sign) -> Self {
        let r = Rotation { axis, sign }.generator();
        let mut out: RawMatrix = [[0; 3]; 3];

        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.0[i][k] * r[k][j]).sum();
            }
        }

        Self(out)
    }

    /// Applies a parsed [`Rotation`].
    #[must_use]
    pub fn apply(&self, rotation: Rotation) -> Self {
        self.rotate(rotation.axis, rotation.sign)
    }

    /// Splits the matrix into one view per vehicle axis (Front, Left, Top).
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not a signed permutation. This can only happen
    /// if a caller bypassed [`OrientationMatrix::rotate`]; it is a programming
    /// error, not a runtime condition.
    #[must_use]
    pub fn decompose(&self) -> [AxisView; 3] {
        assert!(
            self.is_valid(),
            "orientation matrix is not a signed permutation: {:?}",
            self.0
        );

        VehicleAxis::ALL.map(|vehicle| {
            let col = vehicle as usize;
            let row = (0..3)
                .find(|&i| self.0[i][col] != 0)
                .unwrap_or_default();
            let positive = self.0[row][col] > 0;
            let (sensor, direction) = match (row, positive) {
                (0, true) => (Axis::X, Direction::Up),
                (0, false) => (Axis::X, Direction::Down),
                (1, true) => (Axis::Y, Direction::Left),
                (1, false) => (Axis::Y, Direction::Right),
                (_, true) => (Axis::Z, Direction::Top),
                (_, false) => (Axis::Z, Direction::Bottom),
            };
            AxisView { vehicle, sensor, positive, direction }
        })
    }
}

/// Checks that every row and column holds exactly one ±1 and zeros elsewhere.
#[must_use]
pub fn is_signed_permutation(m: &RawMatrix) -> bool {
    let entries_ok = m.iter().flatten().all(|&v| (-1..=1).contains(&v));
    let rows_ok = m.iter().all(|row| row.iter().filter(|&&v| v != 0).count() == 1);
    let cols_ok = (0..3).all(|j| (0..3).filter(|&i| m[i][j] != 0).count() == 1);
    entries_ok && rows_ok && cols_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_decompose() {
        let views = OrientationMatrix::identity().decompose();
        assert_eq!(views[0].vehicle, VehicleAxis::Front);
        assert_eq!(views[0].direction, Direction::Up);
        assert_eq!(views[1].direction, Direction::Left);
        assert_eq!(views[2].direction, Direction::Top);
        assert!(views.iter().all(|v| v.positive));
    }

    #[test]
    fn test_rotate_identity_yields_generator() {
        let m = OrientationMatrix::identity().rotate(Axis::Z, Sign::Plus);
        assert_eq!(m.rows(), &ROT_Z_PLUS);
    }

    #[test]
    fn test_opposite_rotations_cancel() {
        for rot in Rotation::ALL {
            let opposite = Rotation {
                axis: rot.axis,
                sign: match rot.sign {
                    Sign::Plus => Sign::Minus,
                    Sign::Minus => Sign::Plus,
                },
            };
            let m = OrientationMatrix::identity().apply(rot).apply(opposite);
            assert_eq!(m, OrientationMatrix::identity(), "{:?} not undone", rot);
        }
    }

    #[test]
    fn test_four_quarter_turns_are_identity() {
        for rot in Rotation::ALL {
            let mut m = OrientationMatrix::identity();
            for _ in 0..4 {
                m = m.apply(rot);
            }
            assert_eq!(m, OrientationMatrix::identity());
        }
    }

    #[test]
    fn test_composition_stays_signed_permutation() {
        // Every generator sequence up to length 4
        let mut frontier = vec![OrientationMatrix::identity()];
        for _ in 0..4 {
            let mut next = Vec::with_capacity(frontier.len() * 6);
            for m in &frontier {
                for rot in Rotation::ALL {
                    let r = m.apply(rot);
                    assert!(r.is_valid(), "not a signed permutation: {:?}", r);
                    next.push(r);
                }
            }
            frontier = next;
        }
        assert_eq!(frontier.len(), 1296);
    }

    #[test]
    fn test_decompose_after_z_rotation() {
        // Front now carried by sensor +Y, Left by sensor -X
        let views = OrientationMatrix::identity().rotate(Axis::Z, Sign::Plus).decompose();
        assert_eq!(views[0].sensor, Axis::Y);
        assert_eq!(views[0].direction, Direction::Left);
        assert_eq!(views[1].sensor, Axis::X);
        assert!(!views[1].positive);
        assert_eq!(views[1].direction, Direction::Down);
        assert_eq!(views[2].direction, Direction::Top);
    }

    #[test]
    fn test_decompose_upside_down() {
        let m = OrientationMatrix::identity()
            .rotate(Axis::X, Sign::Plus)
            .rotate(Axis::X, Sign::Plus);
        let views = m.decompose();
        assert_eq!(views[0].direction, Direction::Up);
        assert_eq!(views[1].direction, Direction::Right);
        assert_eq!(views[2].direction, Direction::Bottom);
    }

    #[test]
    #[should_panic(expected = "signed permutation")]
    fn test_decompose_rejects_invalid_matrix() {
        let m = OrientationMatrix::from_rows_unchecked([[1, 1, 0], [0, 0, 0], [0, 0, 1]]);
        let _ = m.decompose();
    }

    #[test]
    fn test_from_rows_validation() {
        assert!(OrientationMatrix::from_rows(ROT_Y_MINUS).is_some());
        assert!(OrientationMatrix::from_rows([[2, 0, 0], [0, 1, 0], [0, 0, 1]]).is_none());
        assert!(OrientationMatrix::from_rows([[1, 0, 0], [1, 0, 0], [0, 0, 1]]).is_none());
        assert!(OrientationMatrix::from_rows([[0; 3]; 3]).is_none());
    }

    #[test]
    fn test_parse_rotation() {
        assert_eq!("x+".parse::<Rotation>().unwrap(), Rotation { axis: Axis::X, sign: Sign::Plus });
        assert_eq!("Z-".parse::<Rotation>().unwrap(), Rotation { axis: Axis::Z, sign: Sign::Minus });
        assert!("w+".parse::<Rotation>().is_err());
        assert!("x".parse::<Rotation>().is_err());
        assert!("x+-".parse::<Rotation>().is_err());
    }

    #[test]
    fn test_vehicle_axis_labels() {
        assert_eq!(VehicleAxis::Front.label(), 'X');
        assert_eq!(VehicleAxis::Left.label(), 'Y');
        assert_eq!(VehicleAxis::Top.label(), 'Z');
    }
}
