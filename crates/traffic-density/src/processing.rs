//! Per-frame detect → annotate → timing transform shared by the image and
//! video paths.

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use image::RgbImage;
use ml_core::{DetectorError, ObjectDetector};
use tracing::debug;

use crate::{
    annotation::annotate,
    classes::VehicleClassSet,
    timing::{TimingPolicy, TimingResult},
};

/// Detector handle shared between the image path and the video thread.
pub type SharedDetector = Arc<Mutex<dyn ObjectDetector>>;

pub fn shared_detector<D: ObjectDetector + 'static>(detector: D) -> SharedDetector {
    Arc::new(Mutex::new(detector))
}

#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    pub timing: TimingResult,
    pub annotated: RgbImage,
    /// All detections the model reported, vehicle or not.
    pub detections: usize,
}

#[derive(Clone)]
pub struct FrameProcessor {
    detector: SharedDetector,
    classes: Arc<VehicleClassSet>,
    policy: TimingPolicy,
}

impl FrameProcessor {
    pub fn new(detector: SharedDetector, classes: Arc<VehicleClassSet>, policy: TimingPolicy) -> Self {
        Self {
            detector,
            classes,
            policy,
        }
    }

    pub fn process(&self, frame: &RgbImage) -> Result<ProcessedFrame, DetectorError> {
        let detect_start = Instant::now();
        let detections = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| DetectorError::Inference("detector mutex poisoned".into()))?;
            detector.detect(frame)?
        };
        metrics::histogram!("traffic_stage_latency_seconds", "stage" => "detect")
            .record(detect_start.elapsed().as_secs_f64());

        for (idx, det) in detections.iter().enumerate() {
            debug!(
                "  #{idx}: class={} conf={:.3} bbox={:?}",
                det.class_id, det.score, det.bbox
            );
        }

        let annotate_start = Instant::now();
        let annotation = annotate(frame, &detections, &self.classes);
        metrics::histogram!("traffic_stage_latency_seconds", "stage" => "annotate")
            .record(annotate_start.elapsed().as_secs_f64());

        let timing = self.policy.evaluate(annotation.vehicle_count);
        metrics::gauge!("traffic_vehicle_count").set(timing.vehicle_count as f64);
        metrics::gauge!("traffic_green_seconds").set(timing.green_seconds as f64);

        Ok(ProcessedFrame {
            timing,
            annotated: annotation.frame,
            detections: detections.len(),
        })
    }
}
