use serde::{Deserialize, Serialize};

/// Interleaving of the channels in a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Gray,
    Rgb,
    /// Native order of most V4L2/OpenCV capture paths.
    Bgr,
}

impl ChannelOrder {
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ChannelOrder::Gray => 1,
            ChannelOrder::Rgb | ChannelOrder::Bgr => 3,
        }
    }
}

/// Colour channel that discriminates the laser wavelength.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripeChannel {
    #[default]
    Red,
    Green,
    Blue,
}

impl StripeChannel {
    /// Byte offset of this channel inside one pixel of a frame with `order`.
    ///
    /// Gray frames have a single channel, which is used whatever the laser colour.
    #[inline]
    pub fn index_in(self, order: ChannelOrder) -> usize {
        match (order, self) {
            (ChannelOrder::Gray, _) => 0,
            (ChannelOrder::Rgb, StripeChannel::Red) | (ChannelOrder::Bgr, StripeChannel::Blue) => 0,
            (ChannelOrder::Rgb | ChannelOrder::Bgr, StripeChannel::Green) => 1,
            (ChannelOrder::Rgb, StripeChannel::Blue) | (ChannelOrder::Bgr, StripeChannel::Red) => 2,
        }
    }
}

/// Errors produced when wrapping a raw pixel buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

fn expected_len(width: usize, height: usize, order: ChannelOrder) -> Result<usize, FrameError> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(order.channels()))
        .ok_or(FrameError::InvalidDimensions { width, height })
}

/// Borrowed multi-channel frame, row-major and channel-interleaved.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub order: ChannelOrder,
    pub data: &'a [u8], // len = w*h*channels
}

impl<'a> FrameView<'a> {
    /// Wrap a raw buffer, checking its length against the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        order: ChannelOrder,
        data: &'a [u8],
    ) -> Result<Self, FrameError> {
        let expected = expected_len(width, height, order)?;
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Bytes per image row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.order.channels()
    }

    /// Interleaved bytes of row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    /// Channel values of pixel `(x, y)`, or `None` outside the frame.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.order.channels();
        let start = y * self.stride() + x * c;
        Some(&self.data[start..start + c])
    }
}

/// Owned frame as produced by a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl Frame {
    /// Take ownership of a raw buffer, checking its length against the dimensions.
    pub fn from_raw(
        width: usize,
        height: usize,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        FrameView::new(width, height, order, &data)?;
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Frame with every byte set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        order: ChannelOrder,
        value: u8,
    ) -> Result<Self, FrameError> {
        let len = expected_len(width, height, order)?;
        Ok(Self {
            width,
            height,
            order,
            data: vec![value; len],
        })
    }

    #[inline]
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            order: self.order,
            data: &self.data,
        }
    }

    /// Overwrite pixel `(x, y)`. Out-of-frame writes are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: &[u8]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let c = self.order.channels();
        let start = (y * self.width + x) * c;
        let n = c.min(value.len());
        self.data[start..start + n].copy_from_slice(&value[..n]);
    }

    /// Set one channel of pixel `(x, y)`. Out-of-frame writes are ignored.
    pub fn set_channel(&mut self, x: usize, y: usize, channel: usize, value: u8) {
        let c = self.order.channels();
        if x >= self.width || y >= self.height || channel >= c {
            return;
        }
        self.data[(y * self.width + x) * c + channel] = value;
    }
}
