//! Laser stripe extraction.
//!
//! One pass per frame: every image row is reduced to the column of its
//! brightest stripe-channel value, kept only if that value clears the row
//! threshold. Frames are independent; the detector holds no per-frame state.

mod detector;
mod params;

pub use detector::{StripeDetector, StripeRows};
pub use params::StripeDetectorParams;
