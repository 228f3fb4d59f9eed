use std::path::Path;

use anyhow::{Result, bail};
use image::{RgbImage, imageops::FilterType};
use tch::{self, Device, Kind, Tensor};
use tracing::debug;

use crate::{
    Detection, DetectorError, ObjectDetector,
    postprocess::{decode_yolo_row, non_max_suppression},
};

/// TorchScript-backed YOLOv8 detector.
///
/// Expects a model exported with `format=torchscript`, taking a
/// `[1, 3, H, W]` float input in `[0, 1]` and returning `[1, 4 + classes, N]`.
pub struct TorchDetector {
    module: tch::CModule,
    device: Device,
    input_size: (u32, u32),
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TorchDetector {
    /// Load a TorchScript module onto `device`.
    pub fn new<P: AsRef<Path>>(model_path: P, device: Device, input_size: (u32, u32)) -> Result<Self> {
        let (w, h) = input_size;
        if w == 0 || h == 0 {
            bail!("detector input size must be non-zero, got {w}x{h}");
        }
        let module = tch::CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    /// Override the confidence threshold used for filtering detections.
    pub fn with_confidence_threshold(mut self, confidence: f32) -> Self {
        self.confidence_threshold = confidence;
        self
    }

    pub fn with_iou_threshold(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    fn frame_to_tensor(&self, frame: &RgbImage) -> Tensor {
        let (in_w, in_h) = self.input_size;
        let resized;
        let pixels = if frame.dimensions() == (in_w, in_h) {
            frame
        } else {
            resized = image::imageops::resize(frame, in_w, in_h, FilterType::Triangle);
            &resized
        };

        Tensor::from_slice(pixels.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h as i64, in_w as i64, 3])
            .permute([0, 3, 1, 2])
            / 255.0
    }
}

impl ObjectDetector for TorchDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::EmptyFrame { width, height });
        }

        let input = self.frame_to_tensor(frame);
        let output = self
            .module
            .forward_ts(&[input])
            .map_err(|err| DetectorError::Inference(err.to_string()))?;

        let shape = output.size();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(DetectorError::Inference(format!(
                "unexpected detector output shape: {shape:?}"
            )));
        }

        let preds = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .squeeze_dim(0)
            .permute([1, 0])
            .contiguous();
        let rows = Vec::<Vec<f32>>::try_from(&preds)
            .map_err(|err| DetectorError::Inference(err.to_string()))?;

        let (in_w, in_h) = self.input_size;
        let scale_x = width as f32 / in_w as f32;
        let scale_y = height as f32 / in_h as f32;
        let candidates: Vec<Detection> = rows
            .iter()
            .filter_map(|row| decode_yolo_row(row, self.confidence_threshold, scale_x, scale_y))
            .collect();

        let detections = non_max_suppression(candidates, self.iou_threshold);
        debug!(count = detections.len(), "detector pass complete");
        Ok(detections)
    }
}
