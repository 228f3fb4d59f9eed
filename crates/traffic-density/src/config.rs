//! Runtime configuration.
//!
//! Defaults match the bundled four-class traffic model; a JSON file may
//! override any subset of fields.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    classes::{VehicleClass, VehicleClassSet, default_vehicle_classes},
    timing::TimingPolicy,
};

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_OUTPUT_FILE: &str = "output_annotated.mp4";
pub const DEFAULT_OUTPUT_FPS: f64 = 20.0;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid timing policy: {0}")]
    InvalidTiming(String),
    #[error("vehicle class list is empty")]
    NoVehicleClasses,
    #[error("output fps must be positive, got {0}")]
    InvalidFps(f64),
    #[error("failed to read config {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DensityConfig {
    pub vehicle_classes: Vec<VehicleClass>,
    pub image_timing: TimingPolicy,
    pub video_timing: TimingPolicy,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub output_fps: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            vehicle_classes: default_vehicle_classes(),
            image_timing: TimingPolicy::image_default(),
            video_timing: TimingPolicy::video_default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            output_fps: DEFAULT_OUTPUT_FPS,
        }
    }
}

impl DensityConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vehicle_classes.is_empty() {
            return Err(ConfigError::NoVehicleClasses);
        }
        self.image_timing.validate()?;
        self.video_timing.validate()?;
        if !(self.output_fps.is_finite() && self.output_fps > 0.0) {
            return Err(ConfigError::InvalidFps(self.output_fps));
        }
        Ok(())
    }

    pub fn class_set(&self) -> VehicleClassSet {
        VehicleClassSet::new(self.vehicle_classes.iter().cloned())
    }

    /// Where annotated video runs are written.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

/// Kind of input inferred from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}
