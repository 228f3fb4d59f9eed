#![allow(dead_code)]

use std::{
    collections::HashSet,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use image::{Rgb, RgbImage};
use ml_core::{Detection, DetectorError, ObjectDetector};
use traffic_density::{
    FrameProcessor, TimingPolicy, VideoPipeline, classes::default_vehicle_classes, shared_detector,
};
use video_ingest::{
    CaptureError, Frame, FrameFormat, FrameSink, FrameSource, SinkSpec, SourceInfo, VideoBackend,
    WriterError,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
pub const CAR: i64 = 2;
pub const PEDESTRIAN: i64 = 7;

/// Frame whose red channel encodes how many cars the stub detector reports.
pub fn frame_with_cars(cars: u8) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([cars, 0, 0]))
}

/// Reports `frame[0,0].red` cars plus one pedestrian, optionally failing on
/// chosen calls (1-based).
pub struct ColourKeyedDetector {
    calls: Arc<AtomicUsize>,
    fail_on: HashSet<usize>,
    delay: Duration,
}

impl ColourKeyedDetector {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: calls.into_iter().collect(),
            ..Self::new()
        }
    }

    /// Shared count of `detect` calls, readable after the detector is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

impl ObjectDetector for ColourKeyedDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_on.contains(&call) {
            return Err(DetectorError::Inference(format!("scripted failure {call}")));
        }
        let cars = frame.get_pixel(0, 0)[0] as usize;
        let mut detections: Vec<Detection> = (0..cars)
            .map(|i| {
                let x = (i % 8) as f32 * 7.0;
                let y = (i / 8) as f32 * 7.0;
                Detection::new(CAR, [x, y, x + 6.0, y + 6.0], 0.9)
            })
            .collect();
        detections.push(Detection::new(PEDESTRIAN, [40.0, 30.0, 50.0, 45.0], 0.8));
        Ok(detections)
    }
}

pub fn processor<D: ObjectDetector + 'static>(detector: D, policy: TimingPolicy) -> FrameProcessor {
    FrameProcessor::new(
        shared_detector(detector),
        Arc::new(traffic_density::VehicleClassSet::new(default_vehicle_classes())),
        policy,
    )
}

/// What the in-memory sink saw.
#[derive(Default)]
pub struct SinkRecord {
    pub opens: AtomicUsize,
    pub frames: Mutex<Vec<RgbImage>>,
    pub finished: AtomicBool,
    pub spec: Mutex<Option<SinkSpec>>,
    pub source_dropped: AtomicBool,
}

impl SinkRecord {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().expect("sink record lock").len()
    }
}

/// Serves a fixed frame list and records everything written.
pub struct MemoryBackend {
    frames: Vec<RgbImage>,
    total_frames: Option<u64>,
    fail_source: bool,
    fail_sink: bool,
    decode_error_at: Option<usize>,
    pub record: Arc<SinkRecord>,
}

impl MemoryBackend {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        let total = frames.len() as u64;
        Self {
            frames,
            total_frames: Some(total),
            fail_source: false,
            fail_sink: false,
            decode_error_at: None,
            record: Arc::new(SinkRecord::default()),
        }
    }

    pub fn with_unknown_total(mut self) -> Self {
        self.total_frames = None;
        self
    }

    pub fn with_missing_source(mut self) -> Self {
        self.fail_source = true;
        self
    }

    pub fn with_failing_sink(mut self) -> Self {
        self.fail_sink = true;
        self
    }

    /// Fail decoding instead of yielding the frame at this 0-based index.
    pub fn with_decode_error_at(mut self, index: usize) -> Self {
        self.decode_error_at = Some(index);
        self
    }
}

struct MemorySource {
    info: SourceInfo,
    frames: std::vec::IntoIter<RgbImage>,
    next_index: usize,
    decode_error_at: Option<usize>,
    record: Arc<SinkRecord>,
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.record.source_dropped.store(true, Ordering::SeqCst);
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.decode_error_at == Some(self.next_index) {
            return Err(CaptureError::Truncated {
                expected: 3,
                got: 1,
            });
        }
        self.next_index += 1;
        Ok(self.frames.next().map(|image| Frame {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
            timestamp_ms: 0,
            format: FrameFormat::Rgb8,
        }))
    }
}

struct MemorySink {
    record: Arc<SinkRecord>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), WriterError> {
        self.record
            .frames
            .lock()
            .expect("sink record lock")
            .push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), WriterError> {
        self.record.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl VideoBackend for MemoryBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
        if self.fail_source {
            return Err(CaptureError::Open {
                uri: path.display().to_string(),
            });
        }
        Ok(Box::new(MemorySource {
            info: SourceInfo {
                width: WIDTH,
                height: HEIGHT,
                total_frames: self.total_frames,
                fps: Some(25.0),
            },
            frames: self.frames.clone().into_iter(),
            next_index: 0,
            decode_error_at: self.decode_error_at,
            record: self.record.clone(),
        }))
    }

    fn open_sink(&self, spec: &SinkSpec) -> Result<Box<dyn FrameSink>, WriterError> {
        self.record.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_sink {
            return Err(WriterError::Create {
                path: spec.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only output"),
            });
        }
        *self.record.spec.lock().expect("sink record lock") = Some(spec.clone());
        Ok(Box::new(MemorySink {
            record: self.record.clone(),
        }))
    }
}

/// Frames carrying 1, 2, .., n cars.
pub fn counting_frames(n: u8) -> Vec<RgbImage> {
    (1..=n).map(frame_with_cars).collect()
}

pub fn video_pipeline<D: ObjectDetector + 'static>(
    detector: D,
    backend: MemoryBackend,
) -> (VideoPipeline, Arc<SinkRecord>) {
    let record = backend.record.clone();
    let pipeline = VideoPipeline::new(
        processor(detector, TimingPolicy::video_default()),
        Arc::new(backend),
        20.0,
    );
    (pipeline, record)
}
