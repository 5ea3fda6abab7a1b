//! Reflecting sweep control.
//!
//! The actuator moves by a fixed step each tick. When the next position would
//! leave `[angle_low_bound, angle_high_bound]` the step changes sign *before*
//! it is applied, so the position bounces off the bounds instead of being
//! clamped. With `2 * |step| <= high - low` the reflected position is always
//! inside the bounds.

use crate::devices::{Actuator, ActuatorError};
use laser_scan_core::{CalibrationError, CalibrationParameters};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Increasing pulse width.
    Forward,
    Reverse,
}

impl Direction {
    fn of_step(step: i32) -> Self {
        if step >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// Position bookkeeping of the sweep actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub current_pulse_width: i32,
    pub step_size: i32,
    pub direction: Direction,
}

/// Owns the actuator and its state; the only place positions are commanded.
#[derive(Debug)]
pub struct ScanController<A> {
    actuator: A,
    state: ActuatorState,
    low: i32,
    high: i32,
    rest: i32,
    reversals: u64,
}

impl<A: Actuator> ScanController<A> {
    /// Start at the perpendicular pose, moving in the direction of `step_size`.
    pub fn new(
        params: &CalibrationParameters,
        step_size: i32,
        actuator: A,
    ) -> Result<Self, CalibrationError> {
        params.validate()?;
        let range = params
            .sweep_range()
            .ok_or(CalibrationError::BoundsOutsideServoRange {
                low: params.angle_low_bound,
                high: params.angle_high_bound,
                servo_min: params.servo_min_pulse_width,
                servo_max: params.servo_max_pulse_width,
            })?;
        if step_size == 0 || step_size.unsigned_abs().saturating_mul(2) > range.unsigned_abs() {
            return Err(CalibrationError::StepSize {
                step: step_size,
                range,
            });
        }
        Ok(Self {
            actuator,
            state: ActuatorState {
                current_pulse_width: params.perpendicular_pulse_width,
                step_size,
                direction: Direction::of_step(step_size),
            },
            low: params.angle_low_bound,
            high: params.angle_high_bound,
            rest: params.perpendicular_pulse_width,
            reversals: 0,
        })
    }

    #[inline]
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    #[inline]
    pub fn current_pulse_width(&self) -> i32 {
        self.state.current_pulse_width
    }

    /// Number of direction changes so far.
    #[inline]
    pub fn reversals(&self) -> u64 {
        self.reversals
    }

    #[inline]
    pub fn bounds(&self) -> (i32, i32) {
        (self.low, self.high)
    }

    #[inline]
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn into_actuator(self) -> A {
        self.actuator
    }

    /// Command the current position without moving. Used before the first frame.
    pub fn home(&mut self) -> Result<i32, ActuatorError> {
        self.actuator.set_position(self.state.current_pulse_width)?;
        Ok(self.state.current_pulse_width)
    }

    /// Advance one step and command the new position.
    ///
    /// State is committed only once the actuator accepted the command, so it
    /// always describes the last acknowledged position.
    pub fn step(&mut self) -> Result<i32, ActuatorError> {
        let current = self.state.current_pulse_width;
        let mut step = self.state.step_size;
        let forward = current
            .checked_add(step)
            .filter(|next| (self.low..=self.high).contains(next));
        let reversed = forward.is_none();
        let next = match forward {
            Some(next) => next,
            None => {
                // In bounds since 2 * |step| <= high - low.
                step = -step;
                current.saturating_add(step)
            }
        };
        debug_assert!(
            (self.low..=self.high).contains(&next),
            "reflected position {next} outside [{}, {}]",
            self.low,
            self.high
        );

        self.actuator.set_position(next)?;

        self.state = ActuatorState {
            current_pulse_width: next,
            step_size: step,
            direction: Direction::of_step(step),
        };
        if reversed {
            self.reversals += 1;
            log::debug!(
                "sweep reversed at {} (now {:?})",
                current,
                self.state.direction
            );
        }
        Ok(next)
    }

    /// Command the rest pose (perpendicular).
    pub fn park(&mut self) -> Result<(), ActuatorError> {
        self.actuator.set_position(self.rest)?;
        self.state.current_pulse_width = self.rest;
        Ok(())
    }

    /// Stop driving the actuator.
    pub fn relax(&mut self) -> Result<(), ActuatorError> {
        self.actuator.relax()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RecordingActuator;

    fn controller(step: i32) -> ScanController<RecordingActuator> {
        ScanController::new(
            &CalibrationParameters::default(),
            step,
            RecordingActuator::new(),
        )
        .expect("controller")
    }

    #[test]
    fn reverses_exactly_at_high_bound() {
        // 1863 + 11*20 = 2083; the next step would reach 2103 > 2100.
        let mut ctl = controller(20);
        for _ in 0..11 {
            ctl.step().expect("step");
        }
        assert_eq!(ctl.current_pulse_width(), 2083);
        assert_eq!(ctl.state().direction, Direction::Forward);

        assert_eq!(ctl.step().expect("step"), 2063);
        assert_eq!(ctl.state().direction, Direction::Reverse);
        assert_eq!(ctl.state().step_size, -20);
        assert_eq!(ctl.reversals(), 1);
    }

    #[test]
    fn landing_on_a_bound_is_allowed() {
        let params = CalibrationParameters {
            perpendicular_pulse_width: 1500,
            angle_low_bound: 1400,
            angle_high_bound: 1600,
            ..CalibrationParameters::default()
        };
        let mut ctl = ScanController::new(&params, 50, RecordingActuator::new()).expect("ctl");
        let positions: Vec<i32> = (0..6).map(|_| ctl.step().expect("step")).collect();
        assert_eq!(positions, vec![1550, 1600, 1550, 1500, 1450, 1400]);
        assert_eq!(ctl.step().expect("step"), 1450);
        assert_eq!(ctl.reversals(), 2);
    }

    #[test]
    fn stays_within_bounds_over_long_runs() {
        for step in [1, 7, 19, 20, 33, 349, 350, -13] {
            let mut ctl = controller(step);
            let mut seen_low = false;
            let mut seen_high = false;
            for _ in 0..10_000 {
                let pw = ctl.step().expect("step");
                assert!((1400..=2100).contains(&pw), "step {step}: {pw} out of bounds");
                seen_low |= pw - step.abs() < 1400;
                seen_high |= pw + step.abs() > 2100;
            }
            assert!(seen_low && seen_high, "step {step} never covered the sweep");
        }
    }

    #[test]
    fn every_step_is_commanded() {
        let mut ctl = controller(-20);
        ctl.home().expect("home");
        for _ in 0..3 {
            ctl.step().expect("step");
        }
        assert_eq!(ctl.actuator().commands(), vec![1863, 1843, 1823, 1803]);
    }

    #[test]
    fn rejected_command_leaves_state_untouched() {
        let actuator = RecordingActuator::new();
        actuator.fail_on_command(2);
        let mut ctl = ScanController::new(&CalibrationParameters::default(), 20, actuator)
            .expect("controller");
        ctl.step().expect("first step");
        let before = ctl.state();
        let err = ctl.step().unwrap_err();
        assert!(matches!(err, ActuatorError::Rejected { pulse_width: 1903, .. }));
        assert_eq!(ctl.state(), before);
    }

    #[test]
    fn oversized_step_is_rejected() {
        let err = ScanController::new(
            &CalibrationParameters::default(),
            351,
            RecordingActuator::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CalibrationError::StepSize {
                step: 351,
                range: 700
            }
        );
        assert!(ScanController::new(
            &CalibrationParameters::default(),
            0,
            RecordingActuator::new()
        )
        .is_err());
    }

    #[test]
    fn reverses_instead_of_overflowing_near_i32_max() {
        let params = CalibrationParameters {
            servo_max_pulse_width: i32::MAX,
            angle_low_bound: i32::MAX - 100,
            perpendicular_pulse_width: i32::MAX - 50,
            angle_high_bound: i32::MAX - 1,
            ..CalibrationParameters::default()
        };
        let mut ctl = ScanController::new(&params, 40, RecordingActuator::new()).expect("ctl");
        assert_eq!(ctl.step().expect("step"), i32::MAX - 10);
        assert_eq!(ctl.step().expect("step"), i32::MAX - 50);
        assert_eq!(ctl.state().direction, Direction::Reverse);
    }

    #[test]
    fn park_returns_to_perpendicular() {
        let mut ctl = controller(20);
        for _ in 0..5 {
            ctl.step().expect("step");
        }
        ctl.park().expect("park");
        assert_eq!(ctl.current_pulse_width(), 1863);
        assert_eq!(ctl.actuator().commands().last().copied(), Some(1863));
    }
}
