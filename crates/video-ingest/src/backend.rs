//! Source/sink abstraction used by the video pipeline.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::RgbImage;
use tracing::info;

use crate::{
    ffmpeg::{FfmpegSink, FfmpegSource},
    probe::probe_source,
    types::{CaptureError, Frame, SourceInfo, WriterError},
};

/// Decoded stream of frames.
pub trait FrameSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Encoded output accepting whole annotated frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), WriterError>;

    /// Flush and close the output.
    fn finish(self: Box<Self>) -> Result<(), WriterError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SinkSpec {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Opens sources and sinks for a run.
pub trait VideoBackend: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, CaptureError>;
    fn open_sink(&self, spec: &SinkSpec) -> Result<Box<dyn FrameSink>, WriterError>;
}

/// Backend shelling out to the `ffmpeg`/`ffprobe` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegBackend {
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl VideoBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
        let info = probe_source(&self.ffprobe, path)?;
        info!(
            "Video properties: {}x{}, {} frames, {} fps",
            info.width,
            info.height,
            info.total_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into()),
            info.fps
                .map(|f| format!("{f:.2}"))
                .unwrap_or_else(|| "unknown".into()),
        );
        Ok(Box::new(FfmpegSource::spawn(&self.ffmpeg, path, info)?))
    }

    fn open_sink(&self, spec: &SinkSpec) -> Result<Box<dyn FrameSink>, WriterError> {
        if let Some(parent) = spec.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| WriterError::Create {
                path: spec.path.clone(),
                source,
            })?;
        }
        // Fail here, not on the first frame, when the output is unwritable.
        fs::File::create(&spec.path).map_err(|source| WriterError::Create {
            path: spec.path.clone(),
            source,
        })?;
        Ok(Box::new(FfmpegSink::spawn(&self.ffmpeg, spec)?))
    }
}
