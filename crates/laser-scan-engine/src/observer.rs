//! Per-tick side channel.
//!
//! Observers see every processed frame but cannot touch engine state. They are
//! the place for debugging aids such as the pixel probe below.

use laser_scan_core::{FrameView, StripeObservation, SurfacePoint};
use std::sync::{Arc, Mutex};

/// What the engine saw and produced during one tick.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    pub tick: u64,
    /// Actuator position the frame was captured at.
    pub pulse_width: i32,
    pub frame: FrameView<'a>,
    pub observations: &'a [StripeObservation],
    /// Points appended to the cloud this tick, in row order.
    pub points: &'a [SurfacePoint],
}

pub trait ScanObserver {
    fn on_tick(&mut self, ctx: &TickContext<'_>);
}

/// Colour read by a [`PixelProbe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeReading {
    pub tick: u64,
    pub x: usize,
    pub y: usize,
    /// Channel values in the frame's own channel order.
    pub value: Vec<u8>,
}

#[derive(Debug, Default)]
struct ProbeShared {
    pending: Option<(usize, usize)>,
    last: Option<ProbeReading>,
}

/// Handle used to ask a [`PixelProbe`] for a pixel from another thread or UI.
#[derive(Clone, Debug, Default)]
pub struct ProbeHandle {
    shared: Arc<Mutex<ProbeShared>>,
}

impl ProbeHandle {
    /// Read pixel `(x, y)` from the next processed frame.
    pub fn request(&self, x: usize, y: usize) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.pending = Some((x, y));
    }

    pub fn last_reading(&self) -> Option<ProbeReading> {
        let shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.last.clone()
    }
}

/// Logs the colour of a requested pixel once per request.
#[derive(Debug)]
pub struct PixelProbe {
    shared: Arc<Mutex<ProbeShared>>,
}

impl PixelProbe {
    /// Probe answering requests made through `handle`.
    pub fn new(handle: &ProbeHandle) -> Self {
        Self {
            shared: Arc::clone(&handle.shared),
        }
    }
}

impl ScanObserver for PixelProbe {
    fn on_tick(&mut self, ctx: &TickContext<'_>) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        let Some((x, y)) = shared.pending.take() else {
            return;
        };
        match ctx.frame.pixel(x, y) {
            Some(value) => {
                log::info!("X({x}) Y({y}) {:?} {:?}", ctx.frame.order, value);
                shared.last = Some(ProbeReading {
                    tick: ctx.tick,
                    x,
                    y,
                    value: value.to_vec(),
                });
            }
            None => log::warn!(
                "probe ({x}, {y}) outside {}x{} frame",
                ctx.frame.width,
                ctx.frame.height
            ),
        }
    }
}
