//! Single-image path: decode, one detector pass, annotate, time.

use std::path::Path;

use image::RgbImage;
use tracing::info;

use crate::{error::PipelineError, processing::FrameProcessor, timing::TimingResult};

#[derive(Clone, Debug)]
pub struct ImageOutcome {
    pub timing: TimingResult,
    pub raw: RgbImage,
    pub annotated: RgbImage,
}

impl ImageOutcome {
    /// Write the annotated frame; format follows the file extension.
    pub fn save_annotated(&self, path: &Path) -> Result<(), image::ImageError> {
        self.annotated.save(path)
    }
}

/// Synchronous pipeline run on the caller's thread.
#[derive(Clone)]
pub struct ImagePipeline {
    processor: FrameProcessor,
}

impl ImagePipeline {
    pub fn new(processor: FrameProcessor) -> Self {
        Self { processor }
    }

    pub fn process_image(&self, path: &Path) -> Result<ImageOutcome, PipelineError> {
        let raw = image::open(path)
            .map_err(|source| PipelineError::Load {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let processed = self.processor.process(&raw)?;
        info!(
            path = %path.display(),
            vehicles = processed.timing.vehicle_count,
            green_seconds = processed.timing.green_seconds,
            "image processed"
        );

        Ok(ImageOutcome {
            timing: processed.timing,
            raw,
            annotated: processed.annotated,
        })
    }
}
