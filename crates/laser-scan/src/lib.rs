//! High-level facade crate for the `laser-scan-*` workspace.
//!
//! A single camera watches a laser line that a servo sweeps across the scene.
//! Each frame is reduced to one stripe column per image row, and every stripe
//! pixel is triangulated into a horizontal distance and a height. The
//! accumulated profiles form the point cloud of a scan session.
//!
//! ## Quickstart
//!
//! ```no_run
//! use laser_scan::detect;
//! use laser_scan::ScanConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::default();
//! let detection = detect::detect_file("frame.png", &config)?;
//! println!("{} stripe rows, {} points", detection.observations.len(), detection.points.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `laser_scan::core`: calibration, projection model, frames, point cloud.
//! - `laser_scan::stripe`: per-row stripe detector.
//! - `laser_scan::engine`: devices, sweep controller, scan loop, simulated devices.
//! - `laser_scan::detect` (feature `image`): single-image helpers on `image` buffers.
//!
//! The `laser-scan` binary (feature `cli`) runs the detector on one image, a
//! session against a simulated wall, or a session over recorded frames.

pub use laser_scan_core as core;
pub use laser_scan_engine as engine;
pub use laser_scan_stripe as stripe;

pub use laser_scan_core::{
    CalibrationModel, CalibrationParameters, PointCloud, StripeObservation, SurfacePoint,
};
pub use laser_scan_engine::{ScanConfig, ScanEngine, ScanError, ScanSummary, StopSignal};
pub use laser_scan_stripe::{StripeDetector, StripeDetectorParams};

#[cfg(feature = "image")]
pub mod detect;
