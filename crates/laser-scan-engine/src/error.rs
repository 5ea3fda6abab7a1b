use crate::devices::{ActuatorError, CaptureError, EmitterError};
use laser_scan_core::{CalibrationError, CloudError, FrameError};

/// Errors that end a scan session.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("frame capture failed after {attempts} attempt(s): {source}")]
    Capture {
        attempts: u32,
        #[source]
        source: CaptureError,
    },

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    #[error(transparent)]
    Emitter(#[from] EmitterError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("frame size changed mid-session (expected {expected:?}, got {got:?})")]
    FrameSize {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}
