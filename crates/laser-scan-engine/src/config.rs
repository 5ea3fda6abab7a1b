//! JSON session configuration.

use laser_scan_core::{
    CalibrationError, CalibrationModel, CalibrationParameters, ChannelOrder, StripeChannel,
};
use laser_scan_stripe::StripeDetectorParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

fn default_step_degrees() -> f64 {
    2.0
}

fn default_tick_period_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_channel_order() -> ChannelOrder {
    ChannelOrder::Bgr
}

/// Bounded retry with doubling backoff for failed captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRetryParams {
    /// Total attempts per tick, including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each further attempt.
    pub initial_backoff_ms: u64,
}

impl Default for CaptureRetryParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 20,
        }
    }
}

impl CaptureRetryParams {
    /// Wait after the `failed`-th failed attempt (1-based).
    pub fn backoff_after(&self, failed: u32) -> Duration {
        let shift = failed.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1u64 << shift))
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Everything a scan session is built from. Fixed for the session's lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub calibration: CalibrationParameters,
    /// Sweep step per tick in degrees, converted with the pulse-to-angle slope.
    #[serde(default = "default_step_degrees")]
    pub step_degrees: f64,
    /// Explicit step in pulse-width units; overrides `step_degrees`.
    #[serde(default)]
    pub step_pulse_width: Option<i32>,
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Wait after commanding the start position, before the first frame.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub capture: CaptureRetryParams,
    #[serde(default)]
    pub stripe_channel: StripeChannel,
    /// Channel order of frames produced by simulated sources.
    #[serde(default = "default_channel_order")]
    pub channel_order: ChannelOrder,
    /// Stop after this many ticks; run until stopped otherwise.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationParameters::default(),
            step_degrees: default_step_degrees(),
            step_pulse_width: None,
            tick_period_ms: default_tick_period_ms(),
            settle_ms: default_settle_ms(),
            capture: CaptureRetryParams::default(),
            stripe_channel: StripeChannel::default(),
            channel_order: default_channel_order(),
            max_ticks: None,
        }
    }
}

impl ScanConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    #[inline]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    #[inline]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Validated calibration model.
    pub fn build_model(&self) -> Result<CalibrationModel, ConfigError> {
        Ok(CalibrationModel::new(self.calibration.clone())?)
    }

    /// Sweep step in pulse-width units.
    pub fn step_size(&self, model: &CalibrationModel) -> i32 {
        self.step_pulse_width
            .unwrap_or_else(|| model.step_for_degrees(self.step_degrees))
    }

    pub fn detector_params(&self) -> StripeDetectorParams {
        StripeDetectorParams::from_calibration(&self.calibration, self.stripe_channel)
    }
}
