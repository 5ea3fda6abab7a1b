use crate::{engine, stripe};
use crate::core::{ChannelOrder, CloudStats, Frame, FrameError, StripeObservation, SurfacePoint};
use image::ImageReader;
use serde::Serialize;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the single-image helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] engine::ConfigError),
}

/// Stripe rows of one image and the points they project to.
#[derive(Clone, Debug, Serialize)]
pub struct ImageDetection {
    pub width: usize,
    pub height: usize,
    pub observations: Vec<StripeObservation>,
    /// Projected points, in row order; degenerate rows are left out.
    pub points: Vec<SurfacePoint>,
    pub dropped_rows: usize,
}

impl ImageDetection {
    pub fn stats(&self) -> Option<CloudStats> {
        CloudStats::from_points(&self.points)
    }
}

/// Copy an `image::RgbImage` into an owned RGB frame.
pub fn rgb_frame(img: &::image::RgbImage) -> Result<Frame, FrameError> {
    Frame::from_raw(
        img.width() as usize,
        img.height() as usize,
        ChannelOrder::Rgb,
        img.as_raw().clone(),
    )
}

/// Detect and project the stripe of a single frame with the perpendicular pose.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(frame, config), fields(width = frame.width, height = frame.height))
)]
pub fn detect_frame(
    frame: &Frame,
    config: &engine::ScanConfig,
) -> Result<ImageDetection, DetectError> {
    let model = config.build_model()?;
    let detector = stripe::StripeDetector::new(config.detector_params());
    let pulse_width = model.params().perpendicular_pulse_width;

    let observations = detector.detect_all(&frame.view());
    let points: Vec<SurfacePoint> = observations
        .iter()
        .filter_map(|o| model.project_observation(o, pulse_width))
        .collect();
    let dropped_rows = observations.len() - points.len();
    log::debug!(
        "{} stripe rows, {} points, {} dropped",
        observations.len(),
        points.len(),
        dropped_rows
    );

    Ok(ImageDetection {
        width: frame.width,
        height: frame.height,
        observations,
        points,
        dropped_rows,
    })
}

/// Load an image file and run [`detect_frame`] on it.
pub fn detect_file(
    path: impl AsRef<Path>,
    config: &engine::ScanConfig,
) -> Result<ImageDetection, DetectError> {
    let img = ImageReader::open(path)?.decode()?.to_rgb8();
    let frame = rgb_frame(&img)?;
    detect_frame(&frame, config)
}
