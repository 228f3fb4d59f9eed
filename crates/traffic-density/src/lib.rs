//! Traffic density estimation: count vehicles in images or video frames and
//! turn the count into a green-phase duration.
//!
//! The crate is split into focused modules:
//! - `timing`: vehicle count → green time policy.
//! - `classes`: which detector classes count as vehicles.
//! - `annotation`: box and label drawing on a frame copy.
//! - `processing`: shared detect → annotate → timing step.
//! - `still`: single-image pipeline.
//! - `pipeline`: video run loop with pause/resume and encoding.
//! - `playback`: play/pause/stop signalling.
//! - `runner`: runs the video loop on its own thread, one run at a time.
//! - `shell`: headless presentation loop.
//! - `config`, `error`, `telemetry`: ambient plumbing.

pub mod annotation;
pub mod classes;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod processing;
pub mod runner;
pub mod shell;
pub mod still;
pub mod telemetry;
pub mod timing;

pub use annotation::{Annotation, annotate};
pub use classes::{VehicleClass, VehicleClassSet};
pub use config::{ConfigError, DensityConfig, MediaKind};
pub use error::PipelineError;
pub use pipeline::{FrameUpdate, VideoPipeline, VideoSummary, progress_percent};
pub use playback::{PlaybackController, PlaybackMode};
pub use processing::{FrameProcessor, SharedDetector, shared_detector};
pub use runner::{PipelineEvent, RunHandle, VideoRunner};
pub use still::{ImageOutcome, ImagePipeline};
pub use timing::{TimingPolicy, TimingResult, compute_green_time};
