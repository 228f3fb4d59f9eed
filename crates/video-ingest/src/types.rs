use std::{io, path::PathBuf};

use anyhow::Error;
use image::RgbImage;
use thiserror::Error;

/// Raw 8-bit, 3-channel frame decoded from a video source.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Rgb8,
    Bgr8,
}

impl Frame {
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Convert into an RGB image buffer, swapping channels for BGR input.
    pub fn into_rgb_image(self) -> Result<RgbImage, CaptureError> {
        let expected = Self::byte_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(CaptureError::Truncated {
                expected,
                got: self.data.len(),
            });
        }

        let mut data = self.data;
        if self.format == FrameFormat::Bgr8 {
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
        }

        RgbImage::from_raw(self.width, self.height, data).ok_or(CaptureError::Truncated {
            expected,
            got: 0,
        })
    }
}

/// Stream properties discovered when a source is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Container-reported frame count. `None` when the source does not say.
    pub total_frames: Option<u64>,
    pub fps: Option<f64>,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("failed to probe video source {uri:?}: {reason}")]
    Probe { uri: String, reason: String },
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error(transparent)]
    Other(#[from] Error),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to create video sink {path:?}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("frame size {got:?} does not match sink size {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("video sink already closed")]
    Closed,
    #[error("encoder exited with {status}")]
    Encoder { status: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_frames_are_swapped_to_rgb() {
        let frame = Frame {
            data: vec![1, 2, 3, 4, 5, 6],
            width: 2,
            height: 1,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        };
        let image = frame.into_rgb_image().expect("valid frame");
        assert_eq!(image.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let frame = Frame {
            data: vec![0; 5],
            width: 2,
            height: 1,
            timestamp_ms: 0,
            format: FrameFormat::Rgb8,
        };
        assert!(matches!(
            frame.into_rgb_image(),
            Err(CaptureError::Truncated {
                expected: 6,
                got: 5
            })
        ));
    }
}
