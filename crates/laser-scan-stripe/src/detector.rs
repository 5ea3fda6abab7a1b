use crate::StripeDetectorParams;
use laser_scan_core::{FrameView, StripeObservation};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Row-wise laser stripe detector.
///
/// For each image row the column holding the brightest value of the stripe
/// channel is taken; the row is accepted if that value is above the threshold.
/// Ties go to the lowest column.
#[derive(Clone, Debug)]
pub struct StripeDetector {
    params: StripeDetectorParams,
}

impl StripeDetector {
    pub fn new(params: StripeDetectorParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &StripeDetectorParams {
        &self.params
    }

    /// Lazily walk the rows of `frame`, yielding at most one observation per row.
    ///
    /// The iterator is `Clone`, so a detection pass can be restarted without
    /// touching the frame again.
    pub fn detect<'a>(&self, frame: &FrameView<'a>) -> StripeRows<'a> {
        StripeRows {
            frame: *frame,
            offset: self.params.channel.index_in(frame.order),
            threshold: self.params.threshold,
            row: 0,
        }
    }

    /// Collect every observation of `frame`, in increasing row order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn detect_all(&self, frame: &FrameView<'_>) -> Vec<StripeObservation> {
        let out: Vec<StripeObservation> = self.detect(frame).collect();
        log::trace!("{} stripe rows in {}x{} frame", out.len(), frame.width, frame.height);
        out
    }

    /// Observation for a single row, `None` if the row is dark or out of range.
    pub fn detect_row(&self, frame: &FrameView<'_>, row: usize) -> Option<StripeObservation> {
        if row >= frame.height {
            return None;
        }
        let offset = self.params.channel.index_in(frame.order);
        row_observation(frame, row, offset, self.params.threshold)
    }
}

/// Iterator over the stripe observations of one frame.
#[derive(Clone, Debug)]
pub struct StripeRows<'a> {
    frame: FrameView<'a>,
    offset: usize,
    threshold: u8,
    row: usize,
}

impl Iterator for StripeRows<'_> {
    type Item = StripeObservation;

    fn next(&mut self) -> Option<Self::Item> {
        while self.row < self.frame.height {
            let row = self.row;
            self.row += 1;
            if let Some(obs) = row_observation(&self.frame, row, self.offset, self.threshold) {
                return Some(obs);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.frame.height.saturating_sub(self.row)))
    }
}

impl std::iter::FusedIterator for StripeRows<'_> {}

fn row_observation(
    frame: &FrameView<'_>,
    row: usize,
    offset: usize,
    threshold: u8,
) -> Option<StripeObservation> {
    let (column, value) = row_peak(frame.row(row), frame.order.channels(), offset)?;
    (value > threshold).then_some(StripeObservation { row, column })
}

/// First column holding the maximum of channel `offset` in an interleaved row.
#[inline]
fn row_peak(row: &[u8], channels: usize, offset: usize) -> Option<(usize, u8)> {
    let mut best: Option<(usize, u8)> = None;
    for (column, &value) in row.iter().skip(offset).step_by(channels).enumerate() {
        match best {
            Some((_, b)) if value <= b => {}
            _ => best = Some((column, value)),
        }
    }
    best
}
