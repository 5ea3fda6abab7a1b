//! Hardware boundaries consumed by the scan loop.
//!
//! Camera, servo PWM and laser GPIO live behind these traits so that the scan
//! loop can be driven by real drivers, recorded frames or scripted test doubles.

use laser_scan_core::Frame;
use std::time::Duration;

/// Errors reported by a frame source.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),

    #[error("capture timed out after {0:?}")]
    Timeout(Duration),

    /// The device went away and will never produce a frame again.
    #[error("frame source closed")]
    Closed,

    /// A finite recording has delivered all of its frames.
    #[error("frame source exhausted")]
    Exhausted,
}

impl CaptureError {
    /// Whether another capture attempt can succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CaptureError::Closed | CaptureError::Exhausted)
    }
}

/// Errors reported by the sweep actuator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("actuator rejected pulse width {pulse_width}: {reason}")]
    Rejected { pulse_width: i32, reason: String },

    #[error("actuator disconnected: {0}")]
    Disconnected(String),
}

/// Errors reported by the laser emitter.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    #[error("laser emitter fault: {0}")]
    Fault(String),
}

/// Camera producing fixed-resolution frames.
pub trait FrameSource {
    /// Block until the next frame is available (bounded by the source's own timeout).
    fn capture(&mut self) -> Result<Frame, CaptureError>;

    /// Release the device. Called once during shutdown.
    fn release(&mut self) {}
}

/// Device that positions the laser plane.
pub trait Actuator {
    /// Command a position in device-native pulse-width units.
    fn set_position(&mut self, pulse_width: i32) -> Result<(), ActuatorError>;

    /// Stop driving the actuator (servo pulses off). Called once during shutdown.
    fn relax(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

/// Laser line emitter.
pub trait Emitter {
    fn enable(&mut self) -> Result<(), EmitterError>;
    fn disable(&mut self) -> Result<(), EmitterError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        (**self).capture()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn set_position(&mut self, pulse_width: i32) -> Result<(), ActuatorError> {
        (**self).set_position(pulse_width)
    }

    fn relax(&mut self) -> Result<(), ActuatorError> {
        (**self).relax()
    }
}

impl<T: Emitter + ?Sized> Emitter for Box<T> {
    fn enable(&mut self) -> Result<(), EmitterError> {
        (**self).enable()
    }

    fn disable(&mut self) -> Result<(), EmitterError> {
        (**self).disable()
    }
}
