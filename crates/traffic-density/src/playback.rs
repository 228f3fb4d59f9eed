//! Play/pause and stop signalling between the shell and a video run.

use std::{
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    Playing,
    Paused,
}

impl PlaybackMode {
    pub fn toggled(self) -> Self {
        match self {
            PlaybackMode::Playing => PlaybackMode::Paused,
            PlaybackMode::Paused => PlaybackMode::Playing,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Playing => "playing",
            PlaybackMode::Paused => "paused",
        }
    }
}

struct PlaybackShared {
    mode: Mutex<PlaybackMode>,
    changed: Condvar,
    stop: AtomicBool,
}

/// Handle shared by the shell and one video run.
///
/// The shell only toggles and reads; the run thread waits on it while
/// paused. Each run gets a fresh controller starting in `Playing`.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<PlaybackShared>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PlaybackShared {
                mode: Mutex::new(PlaybackMode::Playing),
                changed: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
        }
    }

    /// Flip between playing and paused, returning the new mode.
    pub fn toggle(&self) -> PlaybackMode {
        let mut mode = self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *mode = mode.toggled();
        let new_mode = *mode;
        drop(mode);
        self.shared.changed.notify_all();
        new_mode
    }

    pub fn read(&self) -> PlaybackMode {
        *self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the run to stop; wakes a paused run immediately.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        // Take the lock so a waiter cannot miss the wakeup between its
        // stop check and its wait.
        let _guard = self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.changed.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Block while paused, for at most `timeout`.
    ///
    /// Returns the mode at wake-up: `Playing` means the caller may advance,
    /// `Paused` means the timeout elapsed (or a stop was requested) and the
    /// caller should re-check its stop condition before waiting again.
    pub(crate) fn wait_while_paused(&self, timeout: Duration) -> PlaybackMode {
        let guard = self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _timed_out) = self
            .shared
            .changed
            .wait_timeout_while(guard, timeout, |mode| {
                *mode == PlaybackMode::Paused && !self.shared.stop.load(Ordering::SeqCst)
            })
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
