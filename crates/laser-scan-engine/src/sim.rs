//! Simulated devices for tests, demos and dry runs.
//!
//! The recording devices are cheap handles over shared state: keep a clone
//! before handing one to the engine to inspect what the engine did with it.

use crate::devices::{Actuator, ActuatorError, CaptureError, Emitter, EmitterError, FrameSource};
use laser_scan_core::{CalibrationModel, ChannelOrder, Frame, FrameError, StripeChannel};
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
struct ActuatorLog {
    commands: Vec<i32>,
    attempts: usize,
    fail_at: Option<usize>,
    relaxed: bool,
}

/// Actuator that records every accepted command.
#[derive(Clone, Debug, Default)]
pub struct RecordingActuator {
    inner: Arc<Mutex<ActuatorLog>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`-th command attempt (1-based) and every one after it.
    pub fn fail_on_command(&self, n: usize) {
        lock(&self.inner).fail_at = Some(n);
    }

    /// Accepted positions, oldest first.
    pub fn commands(&self) -> Vec<i32> {
        lock(&self.inner).commands.clone()
    }

    pub fn relaxed(&self) -> bool {
        lock(&self.inner).relaxed
    }
}

impl Actuator for RecordingActuator {
    fn set_position(&mut self, pulse_width: i32) -> Result<(), ActuatorError> {
        let mut log = lock(&self.inner);
        log.attempts += 1;
        if log.fail_at.is_some_and(|n| log.attempts >= n) {
            return Err(ActuatorError::Rejected {
                pulse_width,
                reason: "injected fault".to_string(),
            });
        }
        log.commands.push(pulse_width);
        log.relaxed = false;
        Ok(())
    }

    fn relax(&mut self) -> Result<(), ActuatorError> {
        lock(&self.inner).relaxed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct EmitterLog {
    enabled: bool,
    transitions: Vec<bool>,
    fail_enable: bool,
    fail_disable: bool,
}

/// Laser emitter that records on/off transitions.
#[derive(Clone, Debug, Default)]
pub struct RecordingEmitter {
    inner: Arc<Mutex<EmitterLog>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.inner).enabled
    }

    /// Every requested state, oldest first (`true` = on).
    pub fn transitions(&self) -> Vec<bool> {
        lock(&self.inner).transitions.clone()
    }

    /// Make `enable` fail (the laser stays off).
    pub fn fail_enable(&self) {
        lock(&self.inner).fail_enable = true;
    }

    /// Make `disable` fail (the laser stays on).
    pub fn fail_disable(&self) {
        lock(&self.inner).fail_disable = true;
    }
}

impl Emitter for RecordingEmitter {
    fn enable(&mut self) -> Result<(), EmitterError> {
        let mut log = lock(&self.inner);
        log.transitions.push(true);
        if log.fail_enable {
            return Err(EmitterError::Fault("injected fault".to_string()));
        }
        log.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), EmitterError> {
        let mut log = lock(&self.inner);
        log.transitions.push(false);
        if log.fail_disable {
            return Err(EmitterError::Fault("injected fault".to_string()));
        }
        log.enabled = false;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Result<Frame, CaptureError>>,
    captures: usize,
    released: bool,
}

/// Frame source replaying a fixed queue of frames and failures.
///
/// Once the queue is empty every capture returns [`CaptureError::Closed`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedFrames {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedFrames {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Frame>,
    {
        let script = Self::default();
        for frame in frames {
            script.push_frame(frame);
        }
        script
    }

    pub fn push_frame(&self, frame: Frame) {
        lock(&self.inner).queue.push_back(Ok(frame));
    }

    pub fn push_error(&self, err: CaptureError) {
        lock(&self.inner).queue.push_back(Err(err));
    }

    pub fn remaining(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    /// Number of `capture` calls so far.
    pub fn captures(&self) -> usize {
        lock(&self.inner).captures
    }

    pub fn released(&self) -> bool {
        lock(&self.inner).released
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let mut script = lock(&self.inner);
        script.captures += 1;
        script.queue.pop_front().unwrap_or(Err(CaptureError::Closed))
    }

    fn release(&mut self) {
        lock(&self.inner).released = true;
    }
}

/// Flat wall at a constant horizontal distance, lit by the laser stripe.
///
/// Under the planar model the stripe column depends on the wall distance only,
/// so every frame shows the stripe in the same column over `rows`.
#[derive(Clone, Debug)]
pub struct WallScene {
    frame: Frame,
    column: usize,
    captures: u64,
}

impl WallScene {
    /// Render the wall once; `None` if the wall would be outside the frame.
    pub fn new(
        model: &CalibrationModel,
        distance: f64,
        width: usize,
        height: usize,
        order: ChannelOrder,
        rows: Range<usize>,
    ) -> Result<Option<Self>, FrameError> {
        let Some(column) = model.column_for_distance(distance) else {
            return Ok(None);
        };
        let column = column.round();
        if column < 0.0 || column >= width as f64 {
            return Ok(None);
        }
        let column = column as usize;

        let mut frame = Frame::filled(width, height, order, 24)?;
        let channel = StripeChannel::Red.index_in(order);
        let peak = model.params().stripe_row_threshold.saturating_add(60);
        for y in rows.start.min(height)..rows.end.min(height) {
            // Soft stripe profile: neighbours lit, centre brightest.
            if column > 0 {
                frame.set_channel(column - 1, y, channel, peak / 2);
            }
            frame.set_channel(column, y, channel, peak);
            frame.set_channel(column + 1, y, channel, peak / 2);
        }
        Ok(Some(Self {
            frame,
            column,
            captures: 0,
        }))
    }

    /// Column the stripe is drawn at.
    #[inline]
    pub fn stripe_column(&self) -> usize {
        self.column
    }

    #[inline]
    pub fn captures(&self) -> u64 {
        self.captures
    }
}

impl FrameSource for WallScene {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.captures += 1;
        Ok(self.frame.clone())
    }
}
