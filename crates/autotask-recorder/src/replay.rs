//! Cancellable, speed-scaled replay
//!
//! A [`Player`] holds one read-only [`EventLog`] and an [`InputSink`]. `play()` runs the
//! log on a background thread and returns a [`PlaybackHandle`]. Pause, resume, cancel
//! and holds are issued from the controlling thread through [`PlaybackControl`] and
//! take effect within one slice.

use crate::control::{Cancelled, PlaybackControl};
use crate::input::InputSink;
use autotask_core::filter;
use autotask_core::{Error, ErrorCode, Event, EventLog, Key, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Playback speed multiplier (1.0 = real time, 2.0 = twice as fast)
    pub speed: f64,
    pub repeat_count: u32,
    /// Preparation window before the first event of every repeat
    pub lead_in_ms: u64,
    /// Pause between two repeats
    pub repeat_pause_ms: u64,
    /// Insert a batch pause after this many processed events. 0 disables.
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    /// Upper bound on a single wait, i.e. the pause/cancel latency
    pub slice_ms: u64,
    pub user_input_pause_ms: u64,
    pub copy_paste_pause_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            repeat_count: 1,
            lead_in_ms: 3000,
            repeat_pause_ms: 2000,
            batch_size: 25,
            batch_pause_ms: 1500,
            slice_ms: 50,
            user_input_pause_ms: 2000,
            copy_paste_pause_ms: 5000,
        }
    }
}

impl PlayerConfig {
    /// Configuration without lead-in or scheduled pauses
    pub fn immediate() -> Self {
        Self {
            lead_in_ms: 0,
            repeat_pause_ms: 0,
            batch_size: 0,
            batch_pause_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_speed(self.speed)?;
        validate_repeats(self.repeat_count)?;
        if self.slice_ms == 0 || self.slice_ms >= 100 {
            return Err(Error::invalid_configuration(format!(
                "slice_ms must be between 1 and 99, got {}",
                self.slice_ms
            )));
        }
        Ok(())
    }

    pub fn slice(&self) -> Duration {
        Duration::from_millis(self.slice_ms)
    }

    pub fn user_input_pause(&self) -> Duration {
        Duration::from_millis(self.user_input_pause_ms)
    }

    pub fn copy_paste_pause(&self) -> Duration {
        Duration::from_millis(self.copy_paste_pause_ms)
    }
}

fn validate_speed(speed: f64) -> Result<()> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(Error::invalid_configuration(format!(
            "speed must be a positive number, got {}",
            speed
        ))
        .with_suggestions(vec!["Use 1.0 for real time, 2.0 for double speed".into()]));
    }
    Ok(())
}

fn validate_repeats(repeat_count: u32) -> Result<()> {
    if repeat_count < 1 {
        return Err(Error::invalid_configuration("repeat count must be at least 1"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
    Completed,
    Cancelled,
}

/// Snapshot of the running or last playback
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    /// Events applied in the current repeat
    pub current_event: usize,
    pub total_events: usize,
    pub current_repeat: u32,
    pub total_repeats: u32,
    pub speed: f64,
    pub injected: usize,
    pub failed: usize,
}

impl PlaybackStatus {
    fn idle(total_events: usize, config: &PlayerConfig) -> Self {
        Self {
            state: PlayerState::Idle,
            current_event: 0,
            total_events,
            current_repeat: 0,
            total_repeats: config.repeat_count,
            speed: config.speed,
            injected: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

/// Result of one `play()` call
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    pub injected: usize,
    pub failed: usize,
    pub repeats_completed: u32,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// What `load` accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub accepted: usize,
    /// Blocked key events stripped from the log
    pub dropped: usize,
}

/// Handle to a playback running in the background
pub struct PlaybackHandle {
    worker: thread::JoinHandle<PlaybackReport>,
}

impl PlaybackHandle {
    /// Block until playback completes or is cancelled
    pub fn wait(self) -> Result<PlaybackReport> {
        self.worker
            .join()
            .map_err(|_| Error::new(ErrorCode::Unknown, "playback thread panicked"))
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

type SharedSink = Arc<Mutex<Box<dyn InputSink>>>;

/// Replay recorded event logs
pub struct Player {
    config: Mutex<PlayerConfig>,
    log: Mutex<Option<Arc<EventLog>>>,
    sink: SharedSink,
    control: PlaybackControl,
    status: Arc<Mutex<PlaybackStatus>>,
    active: Arc<AtomicBool>,
}

impl Player {
    pub fn new(sink: Box<dyn InputSink>) -> Self {
        let config = PlayerConfig::default();
        Self {
            status: Arc::new(Mutex::new(PlaybackStatus::idle(0, &config))),
            config: Mutex::new(config),
            log: Mutex::new(None),
            sink: Arc::new(Mutex::new(sink)),
            control: PlaybackControl::new(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(sink: Box<dyn InputSink>, config: PlayerConfig) -> Result<Self> {
        let player = Self::new(sink);
        player.set_config(config)?;
        Ok(player)
    }

    pub fn config(&self) -> PlayerConfig {
        self.config.lock().clone()
    }

    /// Replace the whole configuration. Takes effect on the next `play()`.
    pub fn set_config(&self, config: PlayerConfig) -> Result<()> {
        config.validate()?;
        let mut status = self.status.lock();
        status.speed = config.speed;
        status.total_repeats = config.repeat_count;
        *self.config.lock() = config;
        Ok(())
    }

    /// Set speed and repeat count. Out-of-range values are rejected, never clamped.
    pub fn configure(&self, speed: f64, repeat_count: u32) -> Result<()> {
        validate_speed(speed)?;
        validate_repeats(repeat_count)?;
        let config = PlayerConfig {
            speed,
            repeat_count,
            ..self.config()
        };
        self.set_config(config)
    }

    /// Accept a log for playback after stripping blocked key events
    pub fn load(&self, log: &EventLog) -> Result<LoadReport> {
        if self.is_active() {
            return Err(Error::already_active("playback"));
        }
        let (clean, dropped) = filter::sanitize(log);
        if dropped > 0 {
            warn!(dropped, "Stripped blocked key events from loaded log");
        }
        let accepted = clean.len();
        *self.status.lock() = PlaybackStatus::idle(accepted, &self.config());
        *self.log.lock() = Some(Arc::new(clean));
        info!(events = accepted, "Log loaded");
        Ok(LoadReport { accepted, dropped })
    }

    pub fn is_loaded(&self) -> bool {
        self.log.lock().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start replaying the loaded log on a background thread.
    ///
    /// Fails with `AlreadyActive` while another playback runs, `NothingLoaded` without
    /// a log, or the sink's error if it cannot be acquired.
    pub fn play(&self) -> Result<PlaybackHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::already_active("playback"));
        }
        let active = ActiveGuard(self.active.clone());

        let log = self.log.lock().clone().ok_or_else(Error::nothing_loaded)?;
        let config = self.config();

        self.sink.lock().acquire()?;
        let sink = SinkGuard(self.sink.clone());

        self.control.reset();
        {
            let mut status = self.status.lock();
            *status = PlaybackStatus::idle(log.len(), &config);
            status.state = PlayerState::Playing;
        }

        let run = Playback {
            log,
            config,
            control: self.control.clone(),
            status: self.status.clone(),
            sink,
            active,
        };
        let worker = thread::Builder::new()
            .name("autotask-player".into())
            .spawn(move || run.run())
            .map_err(|e| Error::device_unavailable(format!("failed to spawn playback thread: {}", e)))?;

        Ok(PlaybackHandle { worker })
    }

    /// `play()` and wait for the report
    pub fn play_blocking(&self) -> Result<PlaybackReport> {
        self.play()?.wait()
    }

    pub fn pause(&self) {
        self.control.pause();
        info!("Playback paused");
    }

    pub fn resume(&self) {
        self.control.resume();
        info!("Playback resumed");
    }

    /// Ask the running playback to stop. Idempotent.
    pub fn cancel(&self) {
        self.control.cancel();
        info!("Playback cancel requested");
    }

    /// Hold playback while the operator does something by hand
    pub fn pause_for_user_input(&self, duration: Duration) {
        info!(secs = duration.as_secs_f64(), "Holding for user input");
        self.control.hold(duration);
    }

    /// Hold playback while the operator copies or pastes
    pub fn pause_for_copy_paste(&self, duration: Duration) {
        info!(secs = duration.as_secs_f64(), "Holding for copy/paste");
        self.control.hold(duration);
    }

    pub fn status(&self) -> PlaybackStatus {
        let mut status = self.status.lock().clone();
        if status.state == PlayerState::Playing && self.control.is_paused() {
            status.state = PlayerState::Paused;
        }
        status
    }

    pub fn control(&self) -> &PlaybackControl {
        &self.control
    }
}

// ============================================================================
// Playback thread
// ============================================================================

/// Clears the active flag when dropped
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Releases the sink when dropped
struct SinkGuard(SharedSink);

impl SinkGuard {
    fn inject(&self, event: &Event) -> Result<()> {
        let mut sink = self.0.lock();
        inject(sink.as_mut(), event)
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.0.lock().release();
    }
}

#[derive(Default)]
struct Tally {
    injected: usize,
    failed: usize,
    processed: usize,
    repeats_completed: u32,
}

struct Playback {
    log: Arc<EventLog>,
    config: PlayerConfig,
    control: PlaybackControl,
    status: Arc<Mutex<PlaybackStatus>>,
    sink: SinkGuard,
    active: ActiveGuard,
}

impl Playback {
    fn run(self) -> PlaybackReport {
        let started = Instant::now();
        let mut tally = Tally::default();
        info!(
            events = self.log.len(),
            speed = self.config.speed,
            repeats = self.config.repeat_count,
            "Playback started"
        );

        let outcome = match self.drive(&mut tally) {
            Ok(()) => PlaybackOutcome::Completed,
            Err(Cancelled) => PlaybackOutcome::Cancelled,
        };

        let report = PlaybackReport {
            outcome,
            injected: tally.injected,
            failed: tally.failed,
            repeats_completed: tally.repeats_completed,
            elapsed: started.elapsed(),
        };

        // Final state is visible before the session reads as inactive
        let Playback { status, sink, active, .. } = self;
        status.lock().state = match outcome {
            PlaybackOutcome::Completed => PlayerState::Completed,
            PlaybackOutcome::Cancelled => PlayerState::Cancelled,
        };
        drop(sink);
        drop(active);
        info!(
            outcome = ?report.outcome,
            injected = report.injected,
            failed = report.failed,
            elapsed = report.elapsed.as_secs_f64(),
            "Playback finished"
        );
        report
    }

    fn drive(&self, tally: &mut Tally) -> std::result::Result<(), Cancelled> {
        let slice = self.config.slice();
        let total = self.config.repeat_count;
        let last_index = self.log.len().saturating_sub(1);

        for repeat in 1..=total {
            {
                let mut status = self.status.lock();
                status.current_repeat = repeat;
                status.current_event = 0;
            }
            info!(repeat, total, "Starting repeat");
            self.control
                .sleep(Duration::from_millis(self.config.lead_in_ms), slice)?;

            let mut last_time = 0.0;
            for (i, event) in self.log.iter().enumerate() {
                let wait = ((event.time() - last_time) / self.config.speed).max(0.0);
                self.control.sleep(secs(wait), slice)?;
                self.control.checkpoint(slice)?;
                last_time = event.time();

                if filter::is_blocked(event) {
                    warn!(%event, "Refusing to inject blocked event");
                } else {
                    match self.sink.inject(event) {
                        Ok(()) => {
                            tally.injected += 1;
                            debug!(%event, "Injected");
                        }
                        Err(e) => {
                            tally.failed += 1;
                            warn!(%event, error = %e, "Injection failed, continuing");
                        }
                    }
                }
                tally.processed += 1;
                {
                    let mut status = self.status.lock();
                    status.current_event = i + 1;
                    status.injected = tally.injected;
                    status.failed = tally.failed;
                }

                let finished = repeat == total && i == last_index;
                if self.config.batch_size > 0
                    && tally.processed % self.config.batch_size == 0
                    && !finished
                {
                    info!(processed = tally.processed, "Batch pause");
                    self.control
                        .sleep(Duration::from_millis(self.config.batch_pause_ms), slice)?;
                }
            }

            tally.repeats_completed = repeat;
            if repeat < total {
                self.control
                    .sleep(Duration::from_millis(self.config.repeat_pause_ms), slice)?;
            }
        }
        Ok(())
    }
}

fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)
}

/// Apply one event to a sink
pub fn inject(sink: &mut dyn InputSink, event: &Event) -> Result<()> {
    match event {
        Event::PointerMove { x, y, .. } => sink.move_pointer(*x, *y),
        Event::PointerButton { x, y, button, pressed, .. } => {
            sink.move_pointer(*x, *y)?;
            sink.button(*button, *pressed)
        }
        Event::PointerScroll { x, y, dx, dy, .. } => {
            sink.move_pointer(*x, *y)?;
            sink.scroll(*dx, *dy)
        }
        Event::KeyPress { key, .. } => inject_key(sink, key, true),
        Event::KeyRelease { key, .. } => inject_key(sink, key, false),
    }
}

/// Composites press the modifier first and release it last.
///
/// The modifier is never left down: a failed letter press releases it again, and a
/// release always lets go of the modifier even when the letter release fails.
fn inject_key(sink: &mut dyn InputSink, key: &Key, pressed: bool) -> Result<()> {
    match key {
        Key::Composite(composite) => {
            let (modifier, letter) = composite.constituents();
            if pressed {
                sink.key(&modifier, true)?;
                sink.key(&letter, true).inspect_err(|_| {
                    if let Err(e) = sink.key(&modifier, false) {
                        warn!(error = %e, %key, "Could not release modifier after failed press");
                    }
                })
            } else {
                let letter_up = sink.key(&letter, false);
                let modifier_up = sink.key(&modifier, false);
                letter_up.and(modifier_up)
            }
        }
        _ => sink.key(key, pressed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CaptureSink, SinkOp};
    use autotask_core::keys::{Composite, Modifier};
    use autotask_core::MouseButton;

    fn press(t: f64, c: char) -> Event {
        Event::KeyPress { time: t, key: Key::Char(c) }
    }

    fn release(t: f64, c: char) -> Event {
        Event::KeyRelease { time: t, key: Key::Char(c) }
    }

    fn player(sink: &CaptureSink) -> Player {
        Player::with_config(Box::new(sink.clone()), PlayerConfig::immediate()).unwrap()
    }

    fn log(events: Vec<Event>) -> EventLog {
        EventLog::try_from(events).unwrap()
    }

    #[test]
    fn configure_rejects_bad_values() {
        let p = player(&CaptureSink::new());
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = p.configure(speed, 1).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidConfiguration);
        }
        assert!(p.configure(1.0, 0).is_err());
        assert!(p.configure(0.5, 3).is_ok());
        assert_eq!(p.config().speed, 0.5);
        assert_eq!(p.config().repeat_count, 3);
    }

    #[test]
    fn play_without_log_fails() {
        let p = player(&CaptureSink::new());
        let err = p.play().err().unwrap();
        assert_eq!(err.code, ErrorCode::NothingLoaded);
        assert!(!p.is_active());
    }

    #[test]
    fn unavailable_sink_fails_before_session_starts() {
        let p = player(&CaptureSink::unavailable());
        p.load(&log(vec![press(0.0, 'a')])).unwrap();
        let err = p.play().err().unwrap();
        assert_eq!(err.code, ErrorCode::DeviceUnavailable);
        assert!(!p.is_active());
        assert_eq!(p.status().state, PlayerState::Idle);
    }

    #[test]
    fn second_play_while_active_is_rejected() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![press(5.0, 'a')])).unwrap();
        let handle = p.play().unwrap();
        let err = p.play().err().unwrap();
        assert_eq!(err.code, ErrorCode::AlreadyActive);
        p.cancel();
        let report = handle.wait().unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
        assert!(!p.is_active());
        assert!(!sink.is_acquired());
    }

    #[test]
    fn injects_pointer_events_with_position_first() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![
            Event::PointerButton { time: 0.0, x: 4.0, y: 5.0, button: MouseButton::Left, pressed: true },
            Event::PointerScroll { time: 0.0, x: 6.0, y: 7.0, dx: 0, dy: 3 },
        ]))
        .unwrap();
        p.play_blocking().unwrap();
        assert_eq!(
            sink.ops(),
            vec![
                SinkOp::MovePointer { x: 4.0, y: 5.0 },
                SinkOp::Button { button: MouseButton::Left, pressed: true },
                SinkOp::MovePointer { x: 6.0, y: 7.0 },
                SinkOp::Scroll { dx: 0, dy: 3 },
            ]
        );
    }

    #[test]
    fn composites_inject_both_keys_in_order() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![
            Event::KeyPress { time: 0.0, key: Key::Composite(Composite::CtrlC) },
            Event::KeyRelease { time: 0.0, key: Key::Composite(Composite::CtrlC) },
        ]))
        .unwrap();
        p.play_blocking().unwrap();
        let ctrl = Key::Modifier(Modifier::Ctrl);
        let c = Key::Char('c');
        assert_eq!(
            sink.ops(),
            vec![
                SinkOp::Key { key: ctrl, pressed: true },
                SinkOp::Key { key: c, pressed: true },
                SinkOp::Key { key: c, pressed: false },
                SinkOp::Key { key: ctrl, pressed: false },
            ]
        );
    }

    #[test]
    fn failed_composite_never_leaves_ctrl_down() {
        let sink = CaptureSink::new();
        sink.fail_on_key(Key::Char('v'));
        let p = player(&sink);
        p.load(&log(vec![
            Event::KeyPress { time: 0.0, key: Key::Composite(Composite::CtrlV) },
            Event::KeyRelease { time: 0.0, key: Key::Composite(Composite::CtrlV) },
        ]))
        .unwrap();
        let report = p.play_blocking().unwrap();
        assert_eq!(report.failed, 2);
        let ctrl = Key::Modifier(Modifier::Ctrl);
        assert_eq!(
            sink.ops(),
            vec![
                SinkOp::Key { key: ctrl, pressed: true },
                SinkOp::Key { key: ctrl, pressed: false },
                SinkOp::Key { key: ctrl, pressed: false },
            ]
        );
    }

    #[test]
    fn final_state_is_set_once_inactive() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![press(0.0, 'a'), release(0.01, 'a')])).unwrap();
        for _ in 0..20 {
            let handle = p.play().unwrap();
            while p.is_active() {
                thread::yield_now();
            }
            assert_eq!(p.status().state, PlayerState::Completed);
            handle.wait().unwrap();
        }
    }

    #[test]
    fn load_strips_blocked_keys() {
        let p = player(&CaptureSink::new());
        let report = p
            .load(&log(vec![
                Event::KeyPress { time: 0.0, key: Key::Modifier(Modifier::Ctrl) },
                press(0.1, 'a'),
            ]))
            .unwrap();
        assert_eq!(report, LoadReport { accepted: 1, dropped: 1 });
        assert_eq!(p.status().total_events, 1);
    }

    #[test]
    fn failed_injection_is_counted_and_playback_continues() {
        let sink = CaptureSink::new();
        sink.fail_on_key(Key::Char('b'));
        let p = player(&sink);
        p.load(&log(vec![press(0.0, 'a'), press(0.0, 'b'), press(0.0, 'c')]))
            .unwrap();
        let report = p.play_blocking().unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(report.injected, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(sink.ops().len(), 2);
    }

    #[test]
    fn repeats_replay_the_whole_log() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.configure(4.0, 3).unwrap();
        p.load(&log(vec![press(0.0, 'a'), release(0.04, 'a')])).unwrap();
        let report = p.play_blocking().unwrap();
        assert_eq!(report.repeats_completed, 3);
        assert_eq!(report.injected, 6);
        let status = p.status();
        assert_eq!(status.state, PlayerState::Completed);
        assert_eq!(status.current_repeat, 3);
        assert_eq!(status.current_event, 2);
    }

    #[test]
    fn batch_pause_is_inserted_every_batch() {
        let sink = CaptureSink::new();
        let config = PlayerConfig {
            batch_size: 2,
            batch_pause_ms: 150,
            ..PlayerConfig::immediate()
        };
        let p = Player::with_config(Box::new(sink.clone()), config).unwrap();
        p.load(&log(vec![press(0.0, 'a'), press(0.0, 'b'), press(0.0, 'c')]))
            .unwrap();
        p.play_blocking().unwrap();
        let injected = sink.injected();
        let gap = injected[2].at.duration_since(injected[1].at);
        assert!(gap >= Duration::from_millis(140), "{:?}", gap);
    }

    #[test]
    fn pause_blocks_and_resume_continues() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![press(0.0, 'a'), press(0.1, 'b')])).unwrap();
        let handle = p.play().unwrap();
        p.pause();
        thread::sleep(Duration::from_millis(250));
        assert!(sink.ops().len() <= 1);
        assert_eq!(p.status().state, PlayerState::Paused);
        p.resume();
        let report = handle.wait().unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(sink.ops().len(), 2);
    }

    #[test]
    fn hold_delays_the_next_event() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![press(0.0, 'a'), press(0.05, 'b')])).unwrap();
        let start = Instant::now();
        let handle = p.play().unwrap();
        p.pause_for_copy_paste(Duration::from_millis(200));
        handle.wait().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(sink.ops().len(), 2);
    }

    #[test]
    fn cancel_is_prompt_and_releases_sink() {
        let sink = CaptureSink::new();
        let p = player(&sink);
        p.load(&log(vec![press(0.0, 'a'), press(30.0, 'b')])).unwrap();
        let handle = p.play().unwrap();
        while sink.ops().is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        let start = Instant::now();
        p.cancel();
        let report = handle.wait().unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
        assert_eq!(report.injected, 1);
        assert_eq!(p.status().state, PlayerState::Cancelled);
        assert_eq!(p.status().current_event, 1);
        assert!(!sink.is_acquired());
    }
}
