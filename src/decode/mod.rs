pub mod ffmpeg;

pub use ffmpeg::{FfmpegDecoder, FfmpegStream};

use crate::core::error::DecodeError;
use crate::core::frame::FrameRecord;

/// Ordered source of decoded frames for one video.
pub trait FrameStream {
    /// Total number of frames in the video. Only uniform sampling asks;
    /// a backend may pay a full scan to answer.
    fn total_frames(&mut self) -> Result<u64, DecodeError>;

    /// Next frame in strictly increasing index order, or `None` once
    /// the video is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameRecord>, DecodeError>;
}

/// Frame source backed by a prepared list, mostly for tests.
pub struct MemoryStream {
    frames: Vec<FrameRecord>,
    pos: usize,
}

impl MemoryStream {
    pub fn new(frames: Vec<FrameRecord>) -> Self {
        Self { frames, pos: 0 }
    }
}

impl FrameStream for MemoryStream {
    fn total_frames(&mut self) -> Result<u64, DecodeError> {
        Ok(self.frames.len() as u64)
    }

    fn next_frame(&mut self) -> Result<Option<FrameRecord>, DecodeError> {
        match self.frames.get(self.pos) {
            Some(frame) => {
                self.pos += 1;
                Ok(Some(frame.clone()))
            }
            None => Ok(None),
        }
    }
}
