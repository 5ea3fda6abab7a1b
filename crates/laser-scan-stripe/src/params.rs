use laser_scan_core::{CalibrationParameters, StripeChannel};
use serde::{Deserialize, Serialize};

/// Configuration for the stripe detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeDetectorParams {
    /// Channel most discriminative for the laser wavelength.
    #[serde(default)]
    pub channel: StripeChannel,
    /// A row is accepted only if its brightest value is strictly above this.
    pub threshold: u8,
}

impl Default for StripeDetectorParams {
    fn default() -> Self {
        Self::from_calibration(&CalibrationParameters::default(), StripeChannel::Red)
    }
}

impl StripeDetectorParams {
    /// Take the row threshold from the rig calibration.
    pub fn from_calibration(params: &CalibrationParameters, channel: StripeChannel) -> Self {
        Self {
            channel,
            threshold: params.stripe_row_threshold,
        }
    }
}
