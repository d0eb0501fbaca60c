//! Pause, cancel and hold flags shared between the controller and the playback thread
//!
//! Waits block on a condition variable so a control change wakes the sleeper at once.
//! The slice only bounds how long a single wait may last.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Returned by a wait that was interrupted by `cancel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    cancelled: bool,
    hold_until: Option<Instant>,
}

#[derive(Clone, Default)]
pub struct PlaybackControl {
    inner: Arc<(Mutex<ControlState>, Condvar)>,
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.update(|s| s.paused = true);
    }

    pub fn resume(&self) {
        self.update(|s| s.paused = false);
    }

    pub fn cancel(&self) {
        self.update(|s| s.cancelled = true);
    }

    /// Suspend playback for `duration` from now. An existing longer hold is kept.
    pub fn hold(&self, duration: Duration) {
        let until = Instant::now() + duration;
        self.update(|s| {
            s.hold_until = Some(match s.hold_until {
                Some(current) if current > until => current,
                _ => until,
            });
        });
    }

    /// Clear every flag before a new session
    pub fn reset(&self) {
        self.update(|s| *s = ControlState::default());
    }

    pub fn is_paused(&self) -> bool {
        self.inner.0.lock().paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.0.lock().cancelled
    }

    pub fn is_held(&self) -> bool {
        matches!(self.inner.0.lock().hold_until, Some(until) if until > Instant::now())
    }

    fn update(&self, f: impl FnOnce(&mut ControlState)) {
        let (lock, cvar) = &*self.inner;
        f(&mut lock.lock());
        cvar.notify_all();
    }

    /// Let `duration` of playback time pass.
    ///
    /// Time spent paused or held does not count toward `duration`. Returns as soon as
    /// cancel is observed, at most one `slice` after it was requested.
    pub fn sleep(&self, duration: Duration, slice: Duration) -> Result<(), Cancelled> {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock();
        let mut remaining = duration;
        loop {
            if state.cancelled {
                return Err(Cancelled);
            }
            if state.paused {
                cvar.wait_for(&mut state, slice);
                continue;
            }
            if let Some(until) = state.hold_until {
                let now = Instant::now();
                if until > now {
                    cvar.wait_for(&mut state, (until - now).min(slice));
                    continue;
                }
                state.hold_until = None;
            }
            if remaining.is_zero() {
                return Ok(());
            }
            let started = Instant::now();
            cvar.wait_for(&mut state, remaining.min(slice));
            remaining = remaining.saturating_sub(started.elapsed());
        }
    }

    /// Block at an event boundary while paused or held
    pub fn checkpoint(&self, slice: Duration) -> Result<(), Cancelled> {
        self.sleep(Duration::ZERO, slice)
    }
}
