use crate::config::{CaptureRetryParams, ScanConfig};
use crate::controller::ScanController;
use crate::devices::{Actuator, CaptureError, Emitter, FrameSource};
use crate::error::ScanError;
use crate::observer::{ScanObserver, TickContext};
use crate::stop::StopSignal;
use laser_scan_core::{CalibrationModel, CloudStats, Frame, FrameView, PointCloud, SurfacePoint};
use laser_scan_stripe::StripeDetector;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while waiting for the servo to settle.
const SETTLE_POLL: Duration = Duration::from_millis(50);

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of one processed tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    /// Position the frame was captured at.
    pub pulse_width: i32,
    /// Position commanded for the next tick.
    pub next_pulse_width: i32,
    pub observations: usize,
    pub points: usize,
    /// Rows whose projection was degenerate.
    pub dropped_rows: usize,
    pub capture_attempts: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop signal was raised.
    Stopped,
    /// The configured tick limit was reached.
    TickLimit,
    /// A finite frame source delivered its last frame.
    SourceExhausted,
}

/// Session totals, reported once the scanner has shut down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub ticks: u64,
    /// Completed traversals, i.e. direction reversals of the sweep.
    pub sweeps: u64,
    pub points: usize,
    pub dropped_rows: u64,
    pub capture_retries: u64,
    pub stop_reason: StopReason,
    pub stats: Option<CloudStats>,
}

/// Scan loop tying devices, stripe detection and projection together.
///
/// Every tick captures one frame at the current actuator position, projects
/// its stripe rows with that same position, appends them to the cloud and only
/// then advances the actuator.
pub struct ScanEngine<F, A, E> {
    source: F,
    emitter: E,
    controller: ScanController<A>,
    model: CalibrationModel,
    detector: StripeDetector,
    cloud: PointCloud,
    observers: Vec<Box<dyn ScanObserver>>,
    retry: CaptureRetryParams,
    tick_period: Duration,
    settle: Duration,
    max_ticks: Option<u64>,
    frame_size: Option<(usize, usize)>,
    next_tick: u64,
    dropped_rows: u64,
    capture_retries: u64,
    shut_down: bool,
}

impl<F, A, E> ScanEngine<F, A, E>
where
    F: FrameSource,
    A: Actuator,
    E: Emitter,
{
    /// Validate the configuration and take ownership of the devices.
    ///
    /// No device is touched until [`start`](Self::start).
    pub fn new(
        config: &ScanConfig,
        source: F,
        actuator: A,
        emitter: E,
    ) -> Result<Self, ScanError> {
        let model = CalibrationModel::new(config.calibration.clone())?;
        let step = config.step_size(&model);
        let controller = ScanController::new(model.params(), step, actuator)?;
        Ok(Self {
            source,
            emitter,
            controller,
            detector: StripeDetector::new(config.detector_params()),
            model,
            cloud: PointCloud::new(),
            observers: Vec::new(),
            retry: config.capture,
            tick_period: config.tick_period(),
            settle: config.settle(),
            max_ticks: config.max_ticks,
            frame_size: None,
            next_tick: 0,
            dropped_rows: 0,
            capture_retries: 0,
            shut_down: false,
        })
    }

    pub fn add_observer<O: ScanObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    #[inline]
    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    #[inline]
    pub fn controller(&self) -> &ScanController<A> {
        &self.controller
    }

    #[inline]
    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn into_cloud(self) -> PointCloud {
        self.cloud
    }

    /// Ticks processed so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.next_tick
    }

    /// Switch the laser on, command the start position and let the servo settle.
    ///
    /// The settle wait ends early once `stop` is raised.
    pub fn start(&mut self, stop: &StopSignal) -> Result<(), ScanError> {
        let params = self.model.params();
        log::info!(
            "starting scan: sweep [{}, {}] step {} tick {:?}",
            params.angle_low_bound,
            params.angle_high_bound,
            self.controller.state().step_size,
            self.tick_period
        );
        self.emitter.enable()?;
        let home = self.controller.home()?;
        log::debug!("actuator homed at {home}, settling for {:?}", self.settle);
        let settled_at = Instant::now() + self.settle;
        loop {
            let left = settled_at.saturating_duration_since(Instant::now());
            if left.is_zero() || stop.is_stopped() {
                break;
            }
            thread::sleep(left.min(SETTLE_POLL));
        }
        self.shut_down = false;
        Ok(())
    }

    /// Capture, detect, project and record one frame, then advance the sweep.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(tick = self.next_tick))
    )]
    pub fn run_tick(&mut self) -> Result<TickReport, ScanError> {
        let tick = self.next_tick;
        // Read before anything moves: the frame belongs to this position.
        let pulse_width = self.controller.current_pulse_width();

        let (frame, capture_attempts) = self.capture()?;
        let view = FrameView::new(frame.width, frame.height, frame.order, &frame.data)?;
        self.check_frame_size(&frame)?;

        let observations = self.detector.detect_all(&view);
        let mut points: Vec<SurfacePoint> = Vec::with_capacity(observations.len());
        for observation in &observations {
            if let Some(point) = self.model.project_observation(observation, pulse_width) {
                points.push(point);
            }
        }
        let dropped_rows = observations.len() - points.len();
        if dropped_rows > 0 {
            log::debug!("tick {tick}: dropped {dropped_rows} degenerate row(s)");
        }

        self.cloud.push_slice(tick, pulse_width, points.iter().copied())?;

        let ctx = TickContext {
            tick,
            pulse_width,
            frame: view,
            observations: &observations,
            points: &points,
        };
        for observer in &mut self.observers {
            observer.on_tick(&ctx);
        }

        // The slice is recorded; the tick counts even if the next move fails.
        self.next_tick += 1;
        self.dropped_rows += dropped_rows as u64;

        let reversals = self.controller.reversals();
        let next_pulse_width = self.controller.step()?;
        if self.controller.reversals() > reversals {
            log::info!(
                "sweep {} complete at tick {tick} ({} points so far)",
                self.controller.reversals(),
                self.cloud.len()
            );
        }

        Ok(TickReport {
            tick,
            pulse_width,
            next_pulse_width,
            observations: observations.len(),
            points: points.len(),
            dropped_rows,
            capture_attempts,
        })
    }

    /// Run ticks at the configured cadence until `stop` is raised, the tick
    /// limit is reached, the frame source runs out or a fatal error occurs.
    ///
    /// The scanner is shut down in every case. On a fatal error that error is
    /// returned and shutdown failures are only logged.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn run(&mut self, stop: &StopSignal) -> Result<ScanSummary, ScanError> {
        let outcome = self.run_until_stopped(stop);
        let shutdown = self.shutdown();
        match outcome {
            Ok(reason) => {
                shutdown?;
                let summary = self.summary(reason);
                log::info!(
                    "scan finished ({:?}): {} ticks, {} sweeps, {} points",
                    summary.stop_reason,
                    summary.ticks,
                    summary.sweeps,
                    summary.points
                );
                Ok(summary)
            }
            Err(err) => {
                log::error!("scan aborted at tick {}: {err}", self.next_tick);
                if let Err(shutdown_err) = shutdown {
                    log::warn!("shutdown after failure was incomplete: {shutdown_err}");
                }
                Err(err)
            }
        }
    }

    fn run_until_stopped(&mut self, stop: &StopSignal) -> Result<StopReason, ScanError> {
        self.start(stop)?;
        let mut deadline = Instant::now();
        loop {
            if stop.is_stopped() {
                return Ok(StopReason::Stopped);
            }
            if self.max_ticks.is_some_and(|max| self.next_tick >= max) {
                return Ok(StopReason::TickLimit);
            }

            match self.run_tick() {
                Ok(_) => {}
                Err(ScanError::Capture {
                    source: CaptureError::Exhausted,
                    ..
                }) => return Ok(StopReason::SourceExhausted),
                Err(err) => return Err(err),
            }

            deadline += self.tick_period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                // Overran the period; do not try to catch up.
                deadline = now;
            }
        }
    }

    /// Park and relax the actuator, switch the laser off and release the
    /// frame source.
    ///
    /// Every step is attempted; the first failure is returned. Calling this
    /// again after a shutdown is a no-op.
    pub fn shutdown(&mut self) -> Result<(), ScanError> {
        if self.shut_down {
            return Ok(());
        }
        let mut first: Option<ScanError> = None;

        if let Err(err) = self.controller.park() {
            log::warn!("failed to park actuator: {err}");
            first = first.or(Some(err.into()));
        }
        if let Err(err) = self.controller.relax() {
            log::warn!("failed to relax actuator: {err}");
            first = first.or(Some(err.into()));
        }
        if let Err(err) = self.emitter.disable() {
            log::warn!("failed to disable laser: {err}");
            first = first.or(Some(err.into()));
        }
        self.source.release();
        self.shut_down = true;
        log::info!("scanner shut down");

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn summary(&self, stop_reason: StopReason) -> ScanSummary {
        ScanSummary {
            ticks: self.next_tick,
            sweeps: self.controller.reversals(),
            points: self.cloud.len(),
            dropped_rows: self.dropped_rows,
            capture_retries: self.capture_retries,
            stop_reason,
            stats: self.cloud.stats(),
        }
    }

    fn capture(&mut self) -> Result<(Frame, u32), ScanError> {
        let max_attempts = self.retry.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.capture() {
                Ok(frame) => return Ok((frame, attempt)),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let wait = self.retry.backoff_after(attempt);
                    log::warn!(
                        "capture attempt {attempt}/{max_attempts} failed: {err}; retrying in {wait:?}"
                    );
                    self.capture_retries += 1;
                    if !wait.is_zero() {
                        thread::sleep(wait);
                    }
                }
                Err(source) => {
                    return Err(ScanError::Capture {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    fn check_frame_size(&mut self, frame: &Frame) -> Result<(), ScanError> {
        let got = (frame.width, frame.height);
        match self.frame_size {
            None => {
                log::debug!("frame size {}x{}", got.0, got.1);
                self.frame_size = Some(got);
                Ok(())
            }
            Some(expected) if expected == got => Ok(()),
            Some(expected) => Err(ScanError::FrameSize { expected, got }),
        }
    }
}
