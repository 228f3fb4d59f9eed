use std::path::PathBuf;

use ml_core::DetectorError;
use thiserror::Error;
use video_ingest::{CaptureError, WriterError};

/// Failures surfaced to the presentation shell.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not load image {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not open video source {path:?}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: CaptureError,
    },
    #[error("could not open video sink {path:?}")]
    OpenSink {
        path: PathBuf,
        #[source]
        source: WriterError,
    },
    #[error("a video run is already in progress")]
    Busy,
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("failed to decode video frame")]
    Decode(#[source] CaptureError),
    #[error("failed to encode annotated frame")]
    Encode(#[source] WriterError),
    #[error("failed to spawn video pipeline thread")]
    Spawn(#[source] std::io::Error),
    #[error("video pipeline thread panicked")]
    Panicked,
}

impl PipelineError {
    /// Source or sink could not be opened.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            PipelineError::OpenSource { .. } | PipelineError::OpenSink { .. }
        )
    }
}
