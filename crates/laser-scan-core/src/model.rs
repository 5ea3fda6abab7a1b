//! Single-camera swept-laser geometry.
//!
//! The horizontal object coordinate follows a rectangular hyperbola in the
//! pixel offset `u = column - principal_point_x`. With two reference captures
//! `(u1, x1)` and `(u2, x2)` the constants
//!
//! ```text
//! d = x2 - x1
//! k = u2*x2 - u1*x1
//! N = (u1 - u2)*x1*x2
//! ```
//!
//! give `x = N / (u*d - k)`, and the vertical coordinate is
//! `y = (principal_point_y - row) / focal_length * x`. Both reference captures
//! project back exactly onto their own distances.

use crate::{CalibrationError, CalibrationParameters, StripeObservation, SurfacePoint};
use serde::{Deserialize, Serialize};

/// Constants precomputed from the reference captures.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedConstants {
    pub d: f64,
    pub k: f64,
    pub n: f64,
}

impl DerivedConstants {
    fn from_params(params: &CalibrationParameters) -> Self {
        let first = params.reference.first;
        let second = params.reference.second;
        let (u1, x1) = (first.column - params.principal_point_x, first.distance);
        let (u2, x2) = (second.column - params.principal_point_x, second.distance);
        Self {
            d: x2 - x1,
            k: u2 * x2 - u1 * x1,
            n: (u1 - u2) * x1 * x2,
        }
    }
}

/// Validated calibration with the pixel-to-surface conversion.
#[derive(Clone, Debug)]
pub struct CalibrationModel {
    params: CalibrationParameters,
    derived: DerivedConstants,
}

impl CalibrationModel {
    pub fn new(params: CalibrationParameters) -> Result<Self, CalibrationError> {
        params.validate()?;
        let derived = DerivedConstants::from_params(&params);
        Ok(Self { params, derived })
    }

    #[inline]
    pub fn params(&self) -> &CalibrationParameters {
        &self.params
    }

    #[inline]
    pub fn derived(&self) -> DerivedConstants {
        self.derived
    }

    /// Convert a stripe pixel into a surface point.
    ///
    /// `_actuator_pulse_width` is accepted so callers always hand over the
    /// position the frame was captured at, but the planar model does not use
    /// it: every sweep position measures a profile from the pixel offset alone.
    ///
    /// Returns `None` when `|u*d - k|` is below the degeneracy epsilon.
    pub fn project(
        &self,
        row: usize,
        column: usize,
        _actuator_pulse_width: i32,
    ) -> Option<SurfacePoint> {
        let DerivedConstants { d, k, n } = self.derived;

        let u = column as f64 - self.params.principal_point_x;
        let denom = u * d - k;
        if denom.abs() < self.params.degenerate_epsilon || denom == 0.0 {
            return None;
        }

        let x = n / denom;
        let y = (self.params.principal_point_y - row as f64) / self.params.focal_length * x;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(SurfacePoint::new(x, y))
    }

    #[inline]
    pub fn project_observation(
        &self,
        observation: &StripeObservation,
        actuator_pulse_width: i32,
    ) -> Option<SurfacePoint> {
        self.project(observation.row, observation.column, actuator_pulse_width)
    }

    /// Column at which the stripe appears for an object at horizontal distance `x`.
    ///
    /// Inverse of the horizontal part of [`project`](Self::project); `None` for
    /// `x == 0` or when the result is not finite.
    pub fn column_for_distance(&self, x: f64) -> Option<f64> {
        let DerivedConstants { d, k, n } = self.derived;
        if x == 0.0 {
            return None;
        }
        let u = (n / x + k) / d;
        let column = u + self.params.principal_point_x;
        column.is_finite().then_some(column)
    }

    /// Actuator angle relative to the perpendicular pose, in degrees.
    #[inline]
    pub fn pulse_width_to_degrees(&self, pulse_width: i32) -> f64 {
        (f64::from(pulse_width) - f64::from(self.params.perpendicular_pulse_width))
            * self.params.angle_to_pulse_slope()
    }

    /// Pulse width for an angle relative to the perpendicular pose (rounded).
    #[inline]
    pub fn degrees_to_pulse_width(&self, degrees: f64) -> i32 {
        self.params
            .perpendicular_pulse_width
            .saturating_add(self.step_for_degrees(degrees))
    }

    /// Pulse-width increment for a rotation of `degrees` (rounded).
    #[inline]
    pub fn step_for_degrees(&self, degrees: f64) -> i32 {
        (degrees * self.params.pulse_to_angle_slope).round() as i32
    }
}
