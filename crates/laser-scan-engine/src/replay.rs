//! Recorded frames as a frame source.

use crate::devices::{CaptureError, FrameSource};
use image::ImageReader;
use laser_scan_core::{ChannelOrder, Frame};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no png/jpeg/bmp frames in {}", .0.display())]
    Empty(PathBuf),
}

/// Replays image files from a directory in file-name order as BGR frames.
///
/// Frames are decoded lazily, one per capture. A file that fails to decode is
/// logged and skipped. Once every file was read, captures return
/// [`CaptureError::Exhausted`].
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    total: usize,
    skipped: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(ReplayError::Empty(dir.to_path_buf()));
        }
        paths.sort();
        log::info!("replaying {} frame(s) from {}", paths.len(), dir.display());
        Ok(Self {
            total: paths.len(),
            pending: paths.into(),
            skipped: 0,
        })
    }

    /// Number of frames found when the directory was opened.
    #[inline]
    pub fn len(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Files that could not be decoded so far.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Unavailable(format!("{}: {err}", path.display()))
}

/// Decode an image file into a BGR frame.
pub fn load_frame(path: &Path) -> Result<Frame, CaptureError> {
    let rgb = ImageReader::open(path)
        .map_err(|e| unavailable(path, e))?
        .decode()
        .map_err(|e| unavailable(path, e))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut data = rgb.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    Frame::from_raw(width as usize, height as usize, ChannelOrder::Bgr, data)
        .map_err(|e| unavailable(path, e))
}

impl FrameSource for ImageSequenceSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        while let Some(path) = self.pending.pop_front() {
            log::trace!("replay frame {}", path.display());
            match load_frame(&path) {
                Ok(frame) => return Ok(frame),
                Err(err) => {
                    log::warn!("skipping frame: {err}");
                    self.skipped += 1;
                }
            }
        }
        Err(CaptureError::Exhausted)
    }

    fn release(&mut self) {
        self.pending.clear();
    }
}
