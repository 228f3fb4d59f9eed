//! Video decode and encode plumbing.
//!
//! Decoding and encoding run through `ffmpeg` child processes speaking raw
//! `rgb24`; stream properties come from `ffprobe`. The [`VideoBackend`] trait
//! lets callers substitute in-memory sources and sinks.

pub mod backend;
pub mod ffmpeg;
pub mod probe;
pub mod types;

pub use backend::{FfmpegBackend, FrameSink, FrameSource, SinkSpec, VideoBackend};
pub use types::{CaptureError, Frame, FrameFormat, SourceInfo, WriterError};
