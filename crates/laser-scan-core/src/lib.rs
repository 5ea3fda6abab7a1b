//! Core types for a scanned-laser-line triangulation rangefinder.
//!
//! This crate is purely geometric: calibration parameters and the
//! pixel-to-surface model, borrowed/owned frame buffers, stripe observations
//! and the accumulated point cloud. It does not know about actuators, cameras
//! or scan timing.

mod calibration;
mod cloud;
mod frame;
mod logger;
mod model;

pub use calibration::{
    CalibrationError, CalibrationParameters, ReferenceCalibration, ReferencePoint,
};
pub use cloud::{
    CloudError, CloudStats, PointCloud, ProfileSlice, StripeObservation, SurfacePoint,
};
pub use frame::{ChannelOrder, Frame, FrameError, FrameView, StripeChannel};
pub use model::{CalibrationModel, DerivedConstants};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
