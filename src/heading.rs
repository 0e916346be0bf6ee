//! Rotation vector to compass bearing.
//!
//! A rotation-vector sample is turned into a 3×3 rotation matrix, the matrix
//! is remapped so that logical "up" follows the visible top of the display,
//! and the azimuth is extracted and normalized into `[0, 360)` degrees.
//!
//! Axis conventions follow the Android sensor frame (X right, Y up along the
//! screen, Z out of the screen), which is also what the BNO08x reports in.

use std::fmt;

use nalgebra::{Matrix3, Vector3};

use crate::config::HEADING_ACCURACY;

/// Raw rotation-vector sample: the vector part of the orientation quaternion,
/// optionally with the scalar part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Scalar component. Derived from x/y/z when the sensor omits it.
    pub w: Option<f64>,
}

impl RotationVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, w: None }
    }

    pub fn with_scalar(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self {
            x,
            y,
            z,
            w: Some(w),
        }
    }

    /// Scalar component, reconstructed as `sqrt(1 - x² - y² - z²)` when absent.
    pub fn scalar(&self) -> f64 {
        self.w.unwrap_or_else(|| {
            let rem = 1.0 - self.x * self.x - self.y * self.y - self.z * self.z;
            if rem > 0.0 { rem.sqrt() } else { 0.0 }
        })
    }
}

/// Rotation of the visible UI relative to the device's natural orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    /// Maps a rotation in degrees. Anything but 0/90/180/270 is rejected.
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::Rotation0),
            90 => Some(Self::Rotation90),
            180 => Some(Self::Rotation180),
            270 => Some(Self::Rotation270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }

    /// Axis pair that keeps the heading relative to the top of the screen.
    pub fn axis_remap(self) -> AxisRemap {
        let (x, y) = match self {
            Self::Rotation0 => (Axis::X, Axis::Y),
            Self::Rotation90 => (Axis::Y, Axis::MinusX),
            Self::Rotation180 => (Axis::MinusX, Axis::MinusY),
            Self::Rotation270 => (Axis::MinusY, Axis::X),
        };
        AxisRemap { x, y }
    }
}

impl fmt::Display for DisplayRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A signed device axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    MinusX,
    MinusY,
    MinusZ,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X | Axis::MinusX => 0,
            Axis::Y | Axis::MinusY => 1,
            Axis::Z | Axis::MinusZ => 2,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Axis::X | Axis::Y | Axis::Z => 1.0,
            Axis::MinusX | Axis::MinusY | Axis::MinusZ => -1.0,
        }
    }

    fn unit(self) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        v[self.index()] = self.sign();
        v
    }
}

/// New X and Y axes expressed in device axes. Only built from a
/// [`DisplayRotation`], so the two axes are always perpendicular.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisRemap {
    x: Axis,
    y: Axis,
}

impl AxisRemap {
    pub fn x(&self) -> Axis {
        self.x
    }

    pub fn y(&self) -> Axis {
        self.y
    }
}

/// Azimuth, pitch and roll in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    /// Extracts orientation angles from a rotation matrix.
    pub fn from_matrix(r: &Matrix3<f64>) -> Self {
        Self {
            azimuth: r[(0, 1)].atan2(r[(1, 1)]),
            pitch: (-r[(2, 1)]).clamp(-1.0, 1.0).asin(),
            roll: (-r[(2, 0)]).atan2(r[(2, 2)]),
        }
    }
}

/// One computed heading, consumed by the change filter and then dropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingSample {
    /// Degrees in `[0, 360)`.
    pub heading: f64,
    pub accuracy: f64,
}

/// Heading delivered to the application callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingData {
    /// Degrees in `[0, 360)`.
    pub heading: f64,
    pub accuracy: f64,
}

impl fmt::Display for HeadingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}° (accuracy {:.1})", self.heading, self.accuracy)
    }
}

/// Builds the rotation matrix for a rotation-vector sample.
pub fn rotation_matrix(v: &RotationVector) -> Matrix3<f64> {
    let (q1, q2, q3) = (v.x, v.y, v.z);
    let q0 = v.scalar();

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    Matrix3::new(
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    )
}

/// Re-expresses `r` in the coordinate system given by `remap`.
///
/// The new Z axis is `X × Y`, keeping the frame right-handed.
pub fn remap_coordinate_system(r: &Matrix3<f64>, remap: AxisRemap) -> Matrix3<f64> {
    let (xi, yi) = (remap.x.index(), remap.y.index());
    let zi = 3 - xi - yi;
    let z_sign = remap.x.unit().cross(&remap.y.unit())[zi];

    let mut out = Matrix3::zeros();
    for row in 0..3 {
        out[(row, xi)] = remap.x.sign() * r[(row, 0)];
        out[(row, yi)] = remap.y.sign() * r[(row, 1)];
        out[(row, zi)] = z_sign * r[(row, 2)];
    }
    out
}

/// Normalizes any angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = (degrees + 360.0).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Computes the compass bearing for one sample at the given display rotation.
pub fn compute_heading(v: &RotationVector, rotation: DisplayRotation) -> HeadingSample {
    let matrix = rotation_matrix(v);
    let remapped = remap_coordinate_system(&matrix, rotation.axis_remap());
    let orientation = Orientation::from_matrix(&remapped);

    tracing::trace!(
        azimuth = orientation.azimuth,
        pitch = orientation.pitch,
        roll = orientation.roll,
        %rotation,
        "orientation"
    );

    HeadingSample {
        heading: normalize_degrees(orientation.azimuth.to_degrees()),
        accuracy: HEADING_ACCURACY,
    }
}
