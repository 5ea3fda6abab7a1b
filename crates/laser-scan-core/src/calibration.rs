//! Rig calibration parameters.
//!
//! All actuator quantities are in device-native pulse-width units (microseconds
//! of servo PWM on the reference rig). Pixel quantities are in image pixels.

use serde::{Deserialize, Serialize};

/// One reference capture: a known object distance and the stripe column seen at it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Image column of the stripe on the reference target.
    pub column: f64,
    /// Horizontal object distance of the reference target.
    pub distance: f64,
}

/// The two reference captures the inverse-perspective relation is fitted to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCalibration {
    pub first: ReferencePoint,
    pub second: ReferencePoint,
}

impl Default for ReferenceCalibration {
    fn default() -> Self {
        Self {
            first: ReferencePoint {
                column: 351.0,
                distance: 17.0,
            },
            second: ReferencePoint {
                column: 216.0,
                distance: 11.0,
            },
        }
    }
}

/// Errors raised when calibration parameters are inconsistent.
///
/// These are fatal at construction time; nothing mid-scan produces them.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error(
        "sweep bounds must satisfy low < perpendicular < high (low={low}, perpendicular={perpendicular}, high={high})"
    )]
    BoundsOrder {
        low: i32,
        perpendicular: i32,
        high: i32,
    },

    #[error("sweep bounds [{low}, {high}] exceed the servo range [{servo_min}, {servo_max}]")]
    BoundsOutsideServoRange {
        low: i32,
        high: i32,
        servo_min: i32,
        servo_max: i32,
    },

    #[error("focal length must be finite and positive (got {0})")]
    FocalLength(f64),

    #[error("principal point must be finite (got ({x}, {y}))")]
    PrincipalPoint { x: f64, y: f64 },

    #[error("pulse-to-angle slope must be finite and positive (got {0})")]
    PulseToAngleSlope(f64),

    #[error("reference captures are degenerate: {0}")]
    Reference(&'static str),

    #[error("degeneracy epsilon must be finite and non-negative (got {0})")]
    Epsilon(f64),

    #[error("sweep step {step} must be non-zero and at most half the sweep range {range}")]
    StepSize { step: i32, range: i32 },
}

/// Immutable geometric and actuator parameters of the rig.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Column of the optical axis in pixels.
    pub principal_point_x: f64,
    /// Row of the optical axis in pixels.
    pub principal_point_y: f64,
    /// Focal length in pixels.
    pub focal_length: f64,
    /// Camera-to-laser baseline. Kept for documentation: the projection is
    /// fitted to the reference captures instead.
    pub baseline: f64,
    /// Mechanical pulse-width range of the servo.
    pub servo_min_pulse_width: i32,
    pub servo_max_pulse_width: i32,
    /// Pulse-width units per degree of actuator rotation.
    pub pulse_to_angle_slope: f64,
    /// Pulse width at which the laser plane is perpendicular to the baseline.
    pub perpendicular_pulse_width: i32,
    /// Sweep bounds; the controller reflects off them.
    pub angle_low_bound: i32,
    pub angle_high_bound: i32,
    /// A row only yields a stripe pixel if its brightest value exceeds this.
    pub stripe_row_threshold: u8,
    pub reference: ReferenceCalibration,
    /// `|u*d - k|` below this is treated as a degenerate projection.
    #[serde(default = "default_degenerate_epsilon")]
    pub degenerate_epsilon: f64,
}

fn default_degenerate_epsilon() -> f64 {
    1e-9
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        let servo_min_pulse_width = 550;
        let servo_max_pulse_width = 2330;
        Self {
            principal_point_x: 623.905_037_473_436_3,
            principal_point_y: 503.495_244_436_490_9,
            focal_length: 1366.921_175_795_496,
            baseline: 81.6,
            servo_min_pulse_width,
            servo_max_pulse_width,
            pulse_to_angle_slope: f64::from(servo_max_pulse_width - servo_min_pulse_width) / 180.0,
            perpendicular_pulse_width: 1863,
            angle_low_bound: 1400,
            angle_high_bound: 2100,
            stripe_row_threshold: 175,
            reference: ReferenceCalibration::default(),
            degenerate_epsilon: default_degenerate_epsilon(),
        }
    }
}

impl CalibrationParameters {
    /// Degrees of actuator rotation per pulse-width unit.
    #[inline]
    pub fn angle_to_pulse_slope(&self) -> f64 {
        1.0 / self.pulse_to_angle_slope
    }

    /// Width of the sweep in pulse-width units, `None` if it does not fit an `i32`.
    #[inline]
    pub fn sweep_range(&self) -> Option<i32> {
        self.angle_high_bound.checked_sub(self.angle_low_bound)
    }

    /// Check every invariant the model and the controller rely on.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let (low, perpendicular, high) = (
            self.angle_low_bound,
            self.perpendicular_pulse_width,
            self.angle_high_bound,
        );
        if !(low < perpendicular && perpendicular < high) {
            return Err(CalibrationError::BoundsOrder {
                low,
                perpendicular,
                high,
            });
        }
        if low < self.servo_min_pulse_width
            || high > self.servo_max_pulse_width
            || self.sweep_range().is_none()
        {
            return Err(CalibrationError::BoundsOutsideServoRange {
                low,
                high,
                servo_min: self.servo_min_pulse_width,
                servo_max: self.servo_max_pulse_width,
            });
        }
        if !self.focal_length.is_finite() || self.focal_length <= 0.0 {
            return Err(CalibrationError::FocalLength(self.focal_length));
        }
        if !self.principal_point_x.is_finite() || !self.principal_point_y.is_finite() {
            return Err(CalibrationError::PrincipalPoint {
                x: self.principal_point_x,
                y: self.principal_point_y,
            });
        }
        if !self.pulse_to_angle_slope.is_finite() || self.pulse_to_angle_slope <= 0.0 {
            return Err(CalibrationError::PulseToAngleSlope(
                self.pulse_to_angle_slope,
            ));
        }
        if !self.degenerate_epsilon.is_finite() || self.degenerate_epsilon < 0.0 {
            return Err(CalibrationError::Epsilon(self.degenerate_epsilon));
        }
        self.validate_reference()
    }

    fn validate_reference(&self) -> Result<(), CalibrationError> {
        let ReferenceCalibration { first, second } = self.reference;
        let values = [first.column, first.distance, second.column, second.distance];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::Reference("non-finite value"));
        }
        if first.distance == 0.0 || second.distance == 0.0 {
            return Err(CalibrationError::Reference("zero reference distance"));
        }
        if first.distance == second.distance {
            return Err(CalibrationError::Reference("equal reference distances"));
        }
        if first.column == second.column {
            return Err(CalibrationError::Reference("equal reference columns"));
        }
        Ok(())
    }
}
