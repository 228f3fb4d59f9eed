//! Runs [`VideoPipeline`] on its own thread and turns its callbacks into
//! ordered events for the presentation loop.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use tracing::warn;

use crate::{
    error::PipelineError,
    pipeline::{FrameUpdate, VideoPipeline, VideoSummary},
    playback::{PlaybackController, PlaybackMode},
    telemetry,
};

/// Frames buffered between the run thread and the shell.
const EVENT_QUEUE: usize = 4;
/// How often a blocked event send re-checks for a stop request.
const SEND_RETRY: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum PipelineEvent {
    Frame(FrameUpdate),
    Progress(f64),
}

/// Starts video runs, one at a time.
pub struct VideoRunner {
    pipeline: Arc<VideoPipeline>,
    active: Arc<AtomicBool>,
}

/// Clears the busy flag and acknowledges completion when the run thread ends.
struct RunGuard {
    active: Arc<AtomicBool>,
    _done: Sender<()>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl VideoRunner {
    pub fn new(pipeline: VideoPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn a run. Fails with [`PipelineError::Busy`] while another run is
    /// still active.
    pub fn start(&self, source: PathBuf, sink: PathBuf) -> Result<RunHandle, PipelineError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }

        let (done_tx, done_rx) = bounded::<()>(0);
        let guard = RunGuard {
            active: self.active.clone(),
            _done: done_tx,
        };
        let playback = PlaybackController::new();
        let (event_tx, event_rx) = bounded(EVENT_QUEUE);
        let pipeline = self.pipeline.clone();
        let run_playback = playback.clone();

        let spawned = telemetry::spawn_thread("video-pipeline", move || {
            let _guard = guard;
            let progress_tx = event_tx.clone();
            pipeline.run_video(
                &source,
                &sink,
                &run_playback,
                |percent| send_event(&progress_tx, PipelineEvent::Progress(percent), &run_playback),
                |update| send_event(&event_tx, PipelineEvent::Frame(update), &run_playback),
            )
        });

        // On spawn failure the closure, and with it the guard, is dropped,
        // which clears the busy flag again.
        let join = spawned.map_err(PipelineError::Spawn)?;

        Ok(RunHandle {
            playback,
            events: event_rx,
            done: done_rx,
            join: Some(join),
        })
    }
}

/// Deliver an event in order, giving up if the run is being stopped or the
/// shell has gone away.
fn send_event(tx: &Sender<PipelineEvent>, event: PipelineEvent, playback: &PlaybackController) {
    let mut pending = event;
    loop {
        match tx.send_timeout(pending, SEND_RETRY) {
            Ok(()) => return,
            Err(SendTimeoutError::Timeout(event)) => {
                if playback.is_stop_requested() {
                    return;
                }
                pending = event;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                playback.request_stop();
                return;
            }
        }
    }
}

/// Shell-side handle to an active run.
///
/// Dropping the handle requests a stop without waiting for it.
pub struct RunHandle {
    playback: PlaybackController,
    events: Receiver<PipelineEvent>,
    done: Receiver<()>,
    join: Option<thread::JoinHandle<Result<VideoSummary, PipelineError>>>,
}

impl RunHandle {
    /// Events in frame order. Disconnects once the run has ended.
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn toggle(&self) -> PlaybackMode {
        self.playback.toggle()
    }

    pub fn playback(&self) -> PlaybackMode {
        self.playback.read()
    }

    pub fn request_stop(&self) {
        self.playback.request_stop();
    }

    /// Wait for the run to end on its own. Events not yet received are
    /// discarded so the run thread never blocks on a full queue.
    pub fn join(mut self) -> Result<VideoSummary, PipelineError> {
        for _ in self.events.iter() {}
        self.join_thread()
    }

    /// Request a stop and wait up to `timeout` for the run thread to
    /// acknowledge. Returns `None` if it did not finish in time; the thread is
    /// then left to wind down on its own.
    pub fn stop(mut self, timeout: Duration) -> Option<Result<VideoSummary, PipelineError>> {
        self.playback.request_stop();
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Some(self.join_thread()),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Video pipeline did not stop within {timeout:?}");
                None
            }
        }
    }

    fn join_thread(&mut self) -> Result<VideoSummary, PipelineError> {
        match self.join.take() {
            Some(handle) => handle.join().unwrap_or(Err(PipelineError::Panicked)),
            None => Err(PipelineError::Panicked),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.playback.request_stop();
        }
    }
}
