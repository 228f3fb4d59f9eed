//! Video run loop: decode → process → encode → report, with pause/resume
//! and stop handling.
//!
//! The loop owns the source and sink for the whole run. The only state it
//! shares is the [`PlaybackController`], which it consults once per
//! iteration.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use image::RgbImage;
use tracing::{debug, error, info, warn};
use video_ingest::{SinkSpec, VideoBackend};

use crate::{
    error::PipelineError,
    playback::{PlaybackController, PlaybackMode},
    processing::FrameProcessor,
    timing::TimingResult,
};

/// Longest a paused run sleeps before re-checking for a stop request.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One processed frame, handed to the display callback.
#[derive(Clone, Debug)]
pub struct FrameUpdate {
    /// 1-based index of the frame in the source.
    pub frame_number: u64,
    pub raw: RgbImage,
    pub annotated: RgbImage,
    pub timing: TimingResult,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub total_frames: Option<u64>,
    pub output_path: PathBuf,
    pub stopped_early: bool,
}

/// `done / total * 100`, clamped to `[0, 100]`; `0` when the total is unknown.
pub fn progress_percent(done: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Counters owned by the run thread.
#[derive(Debug)]
struct RunProgress {
    frames_processed: u64,
    frames_skipped: u64,
    total_frames: Option<u64>,
}

impl RunProgress {
    fn new(total_frames: Option<u64>) -> Self {
        Self {
            frames_processed: 0,
            frames_skipped: 0,
            total_frames,
        }
    }

    fn consumed(&self) -> u64 {
        self.frames_processed + self.frames_skipped
    }

    fn percent(&self) -> f64 {
        progress_percent(self.consumed(), self.total_frames)
    }
}

enum RunExit {
    Exhausted,
    Stopped,
    Failed(PipelineError),
}

pub struct VideoPipeline {
    processor: FrameProcessor,
    backend: Arc<dyn VideoBackend>,
    output_fps: f64,
}

impl VideoPipeline {
    pub fn new(processor: FrameProcessor, backend: Arc<dyn VideoBackend>, output_fps: f64) -> Self {
        Self {
            processor,
            backend,
            output_fps,
        }
    }

    /// Run over `source_path`, encoding annotated frames to `sink_path`.
    ///
    /// The sink is only created once the source has opened. Frames written
    /// before a stop or failure stay in the output file.
    pub fn run_video<P, F>(
        &self,
        source_path: &Path,
        sink_path: &Path,
        playback: &PlaybackController,
        mut on_progress: P,
        mut on_frame: F,
    ) -> Result<VideoSummary, PipelineError>
    where
        P: FnMut(f64),
        F: FnMut(FrameUpdate),
    {
        let run_span = tracing::info_span!(
            "video.run",
            source = %source_path.display(),
            sink = %sink_path.display(),
        );
        let _run_guard = run_span.enter();

        let mut source =
            self.backend
                .open_source(source_path)
                .map_err(|source| PipelineError::OpenSource {
                    path: source_path.to_path_buf(),
                    source,
                })?;
        let info = source.info().clone();

        let spec = SinkSpec {
            path: sink_path.to_path_buf(),
            width: info.width,
            height: info.height,
            fps: self.output_fps,
        };
        let mut sink = self
            .backend
            .open_sink(&spec)
            .map_err(|source| PipelineError::OpenSink {
                path: sink_path.to_path_buf(),
                source,
            })?;
        info!(
            "Opened {}x{} source ({} frames), writing {}",
            info.width,
            info.height,
            info.total_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into()),
            sink_path.display()
        );

        let mut progress = RunProgress::new(info.total_frames);
        let exit = loop {
            if playback.is_stop_requested() {
                break RunExit::Stopped;
            }
            if playback.wait_while_paused(PAUSE_POLL_INTERVAL) == PlaybackMode::Paused {
                continue;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break RunExit::Exhausted,
                Err(err) => break RunExit::Failed(PipelineError::Decode(err)),
            };
            let raw = match frame.into_rgb_image() {
                Ok(raw) => raw,
                Err(err) => break RunExit::Failed(PipelineError::Decode(err)),
            };

            let frame_number = progress.consumed() + 1;
            let frame_span = tracing::info_span!("frame", frame = frame_number);
            let _frame_guard = frame_span.enter();
            let frame_start = Instant::now();

            match self.processor.process(&raw) {
                Ok(processed) => {
                    if let Err(err) = sink.write_frame(&processed.annotated) {
                        break RunExit::Failed(PipelineError::Encode(err));
                    }
                    debug!(
                        detections = processed.detections,
                        vehicles = processed.timing.vehicle_count,
                        green_seconds = processed.timing.green_seconds,
                        "frame written"
                    );
                    on_frame(FrameUpdate {
                        frame_number,
                        raw,
                        annotated: processed.annotated,
                        timing: processed.timing,
                    });
                    progress.frames_processed += 1;
                    metrics::counter!("traffic_frames_processed_total").increment(1);
                }
                Err(err) => {
                    warn!("Skipping frame #{frame_number}: {err}");
                    progress.frames_skipped += 1;
                    metrics::counter!("traffic_frames_skipped_total").increment(1);
                }
            }
            metrics::histogram!("traffic_stage_latency_seconds", "stage" => "frame")
                .record(frame_start.elapsed().as_secs_f64());

            on_progress(progress.percent());
        };

        // Draining: commit what was written, then release the decoder.
        let finished = sink.finish();
        drop(source);

        let stopped_early = match exit {
            RunExit::Exhausted => false,
            RunExit::Stopped => {
                info!("Stop requested after {} frame(s)", progress.consumed());
                true
            }
            RunExit::Failed(err) => {
                if let Err(finish_err) = finished {
                    error!("Failed to finalise {}: {finish_err}", sink_path.display());
                }
                return Err(err);
            }
        };
        finished.map_err(PipelineError::Encode)?;

        let summary = VideoSummary {
            frames_processed: progress.frames_processed,
            frames_skipped: progress.frames_skipped,
            total_frames: progress.total_frames,
            output_path: sink_path.to_path_buf(),
            stopped_early,
        };
        info!(
            "Video run done: {} processed, {} skipped, output {}",
            summary.frames_processed,
            summary.frames_skipped,
            summary.output_path.display()
        );
        Ok(summary)
    }
}
