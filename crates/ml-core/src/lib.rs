//! Detector-facing types shared by the pipeline crates.
//!
//! The pipeline only ever talks to an [`ObjectDetector`]; concrete backends
//! live behind feature flags so the rest of the workspace builds without a
//! model runtime installed.

use image::RgbImage;
use thiserror::Error;

#[cfg(feature = "with-tch")]
pub mod detector;
pub mod postprocess;

#[cfg(feature = "with-tch")]
pub use tch;

/// Single object reported by a detector for one frame.
///
/// `bbox` is `[x1, y1, x2, y2]` in pixel coordinates of the frame that was
/// passed to [`ObjectDetector::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    pub class_id: i64,
    pub bbox: [f32; 4],
    pub score: f32,
}

impl Detection {
    pub fn new(class_id: i64, bbox: [f32; 4], score: f32) -> Self {
        Self {
            class_id,
            bbox,
            score,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("detector inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Inference backend turning a frame into detections.
///
/// Implementations must accept frames of any size; resizing to the model's
/// input resolution and mapping boxes back is the detector's job.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(frame)
    }
}
