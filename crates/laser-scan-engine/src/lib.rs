//! Scan loop for a scanned-laser-line triangulation rangefinder.
//!
//! [`ScanEngine`] owns three devices behind traits ([`FrameSource`],
//! [`Actuator`], [`Emitter`]) and runs a fixed-cadence loop:
//!
//! 1. capture a frame at the current actuator position (bounded retry),
//! 2. extract the stripe with [`laser_scan_stripe::StripeDetector`],
//! 3. project each stripe row through [`laser_scan_core::CalibrationModel`],
//! 4. append the profile to the [`laser_scan_core::PointCloud`],
//! 5. advance the reflecting sweep of [`ScanController`].
//!
//! The loop checks a [`StopSignal`] at every tick boundary. Any exit, clean or
//! fatal, parks the actuator, switches the laser off and releases the source.
//!
//! ```no_run
//! use laser_scan_engine::{
//!     sim::{RecordingActuator, RecordingEmitter, WallScene},
//!     ScanConfig, ScanEngine, StopSignal,
//! };
//! use laser_scan_core::ChannelOrder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig { max_ticks: Some(50), ..ScanConfig::default() };
//! let model = config.build_model()?;
//! let wall = WallScene::new(&model, 15.0, 1280, 960, ChannelOrder::Bgr, 200..800)?
//!     .ok_or("wall not visible")?;
//! let mut engine = ScanEngine::new(&config, wall, RecordingActuator::new(), RecordingEmitter::new())?;
//! let summary = engine.run(&StopSignal::new())?;
//! println!("{} points", summary.points);
//! # Ok(())
//! # }
//! ```
//!
//! Features:
//! - `image`: [`replay::ImageSequenceSource`], replaying recorded frames.
//! - `tracing`: spans on the scan loop and the stripe detector.

mod config;
mod controller;
mod devices;
mod engine;
mod error;
mod observer;
mod stop;

pub mod sim;

#[cfg(feature = "image")]
pub mod replay;

pub use config::{CaptureRetryParams, ConfigError, ScanConfig};
pub use controller::{ActuatorState, Direction, ScanController};
pub use devices::{Actuator, ActuatorError, CaptureError, Emitter, EmitterError, FrameSource};
pub use engine::{ScanEngine, ScanSummary, StopReason, TickReport};
pub use error::ScanError;
pub use observer::{PixelProbe, ProbeHandle, ProbeReading, ScanObserver, TickContext};
pub use stop::StopSignal;
