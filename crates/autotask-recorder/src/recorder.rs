//! Session recorder
//!
//! Input arrives through an [`InputSource`] on a bounded channel. A background thread
//! stamps, normalizes and filters it and appends accepted events in arrival order.
//! `stop()` detaches the source and hands back the finished [`EventLog`].
//!
//! Pausing discards input but leaves the session clock running, so a pause shows up
//! as an idle gap in the timestamps of the events that follow it.

use crate::input::{Captured, InputSource, RawInput};
use autotask_core::filter;
use autotask_core::keys::{Composite, ControlCode, Key, NamedKey};
use autotask_core::{Error, Event, EventLog, MouseButton, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Record pointer moves. Off by default: clicks carry their own position.
    pub record_pointer_moves: bool,
    /// Minimum distance in pixels between two recorded pointer moves
    pub move_threshold: f64,
    /// Key that toggles pause from inside the input stream. Never recorded.
    pub pause_toggle_key: Option<Key>,
    /// Key that asks the controller to stop. Never recorded.
    pub stop_key: Option<Key>,
    /// Capacity of the capture channel
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_pointer_moves: false,
            move_threshold: 5.0,
            pause_toggle_key: Some(Key::Char('1')),
            stop_key: Some(Key::Named(NamedKey::F10)),
            channel_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

#[derive(Default)]
struct Shared {
    paused: AtomicBool,
    events: AtomicUsize,
    stop_requested: AtomicBool,
}

/// Detaches the source when dropped
struct SourceGuard(Arc<dyn InputSource>);

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.0.detach();
    }
}

struct ActiveSession {
    source: SourceGuard,
    stop_tx: Sender<()>,
    worker: thread::JoinHandle<EventLog>,
    shared: Arc<Shared>,
}

impl ActiveSession {
    fn finish(self) -> EventLog {
        drop(self.source);
        let _ = self.stop_tx.send(());
        match self.worker.join() {
            Ok(log) => log,
            Err(_) => {
                warn!("Recorder thread panicked, discarding session");
                EventLog::new()
            }
        }
    }
}

/// The recorder
pub struct Recorder {
    config: RecorderConfig,
    source: Arc<dyn InputSource>,
    session: Mutex<Option<ActiveSession>>,
    stopped: AtomicBool,
}

impl Recorder {
    pub fn new(source: Arc<dyn InputSource>) -> Self {
        Self::with_config(source, RecorderConfig::default())
    }

    pub fn with_config(source: Arc<dyn InputSource>, config: RecorderConfig) -> Self {
        Self {
            config,
            source,
            session: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Begin a new session.
    ///
    /// Fails with `AlreadyActive` while a session runs and with whatever the source
    /// reports if it cannot be attached. No session exists after a failure.
    pub fn start(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(Error::already_active("recording"));
        }

        let (tx, rx) = bounded::<Captured>(self.config.channel_capacity.max(1));
        let start = Instant::now();
        self.source.attach(tx)?;
        let source = SourceGuard(self.source.clone());

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::new(Shared::default());
        let capture = Capture::new(start, self.config.clone(), shared.clone());
        let worker = thread::Builder::new()
            .name("autotask-recorder".into())
            .spawn(move || capture.run(rx, stop_rx))
            .map_err(|e| Error::device_unavailable(format!("failed to spawn recorder thread: {}", e)))?;

        *session = Some(ActiveSession {
            source,
            stop_tx,
            worker,
            shared,
        });
        self.stopped.store(false, Ordering::SeqCst);
        info!("Recording started");
        Ok(())
    }

    /// End the session and return its events. Returns an empty log when idle.
    pub fn stop(&self) -> EventLog {
        let Some(session) = self.session.lock().take() else {
            return EventLog::new();
        };
        let log = session.finish();
        self.stopped.store(true, Ordering::SeqCst);
        info!(events = log.len(), duration = log.duration(), "Recording stopped");
        log
    }

    pub fn pause(&self) {
        if let Some(s) = self.session.lock().as_ref() {
            s.shared.paused.store(true, Ordering::SeqCst);
            info!("Recording paused");
        }
    }

    pub fn resume(&self) {
        if let Some(s) = self.session.lock().as_ref() {
            s.shared.paused.store(false, Ordering::SeqCst);
            info!("Recording resumed");
        }
    }

    pub fn state(&self) -> RecorderState {
        match self.session.lock().as_ref() {
            Some(s) if s.shared.paused.load(Ordering::SeqCst) => RecorderState::Paused,
            Some(_) => RecorderState::Recording,
            None if self.stopped.load(Ordering::SeqCst) => RecorderState::Stopped,
            None => RecorderState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Events accepted so far in the running session
    pub fn event_count(&self) -> usize {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.shared.events.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// True once the stop key was seen in the running session
    pub fn stop_requested(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.shared.stop_requested.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.finish();
        }
    }
}

// ============================================================================
// Capture thread
// ============================================================================

struct Capture {
    start: Instant,
    config: RecorderConfig,
    shared: Arc<Shared>,
    log: EventLog,
    ctrl_down: HashSet<Key>,
    /// Presses recorded without their release yet
    open_keys: HashSet<Key>,
    /// Raw keys whose press was dropped as a Ctrl+letter control code
    swallowed: HashSet<Key>,
    open_buttons: HashSet<MouseButton>,
    last_move: Option<(f64, f64)>,
}

impl Capture {
    fn new(start: Instant, config: RecorderConfig, shared: Arc<Shared>) -> Self {
        Self {
            start,
            config,
            shared,
            log: EventLog::new(),
            ctrl_down: HashSet::new(),
            open_keys: HashSet::new(),
            swallowed: HashSet::new(),
            open_buttons: HashSet::new(),
            last_move: None,
        }
    }

    fn run(mut self, rx: Receiver<Captured>, stop_rx: Receiver<()>) -> EventLog {
        loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok(captured) => self.handle(captured),
                    Err(_) => break,
                },
                recv(stop_rx) -> _ => break,
            }
        }
        // Input that arrived before the source was detached
        while let Ok(captured) = rx.try_recv() {
            self.handle(captured);
        }
        self.log
    }

    fn paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn handle(&mut self, captured: Captured) {
        let time = captured.at.saturating_duration_since(self.start).as_secs_f64();
        match captured.input {
            RawInput::KeyDown(key) => self.key_down(time, key),
            RawInput::KeyUp(key) => self.key_up(time, key),
            RawInput::PointerMove { x, y } => {
                if !self.config.record_pointer_moves || self.paused() {
                    return;
                }
                if let Some((lx, ly)) = self.last_move {
                    if (x - lx).hypot(y - ly) < self.config.move_threshold {
                        return;
                    }
                }
                self.last_move = Some((x, y));
                self.push(Event::PointerMove { time, x, y });
            }
            RawInput::PointerButton { x, y, button, pressed } => {
                if pressed {
                    if self.paused() {
                        return;
                    }
                    self.open_buttons.insert(button);
                } else if !self.open_buttons.remove(&button) && self.paused() {
                    return;
                }
                self.push(Event::PointerButton { time, x, y, button, pressed });
            }
            RawInput::PointerScroll { x, y, dx, dy } => {
                if self.paused() {
                    return;
                }
                self.push(Event::PointerScroll { time, x, y, dx, dy });
            }
        }
    }

    fn key_down(&mut self, time: f64, key: Key) {
        if key.is_ctrl() {
            self.ctrl_down.insert(key);
        }
        if Some(key) == self.config.stop_key {
            self.shared.stop_requested.store(true, Ordering::SeqCst);
            info!("Stop key pressed");
            return;
        }
        if Some(key) == self.config.pause_toggle_key {
            let was = self.shared.paused.fetch_xor(true, Ordering::SeqCst);
            info!(paused = !was, "Pause toggled from input");
            return;
        }
        if self.paused() {
            return;
        }
        let normalized = self.normalize(key);
        if filter::is_blocked_key(&normalized) {
            debug!(key = %normalized, "Dropped blocked key press");
            if matches!(normalized, Key::Control(_)) {
                self.swallowed.insert(key);
            }
            return;
        }
        let key = normalized;
        self.open_keys.insert(key);
        self.push(Event::KeyPress { time, key });
    }

    fn key_up(&mut self, time: f64, key: Key) {
        if key.is_ctrl() {
            self.ctrl_down.remove(&key);
        }
        if Some(key) == self.config.stop_key || Some(key) == self.config.pause_toggle_key {
            return;
        }
        if self.swallowed.remove(&key) {
            return;
        }
        // A composite press is closed by its own release even if Ctrl went up first
        let key = match composite_for(&key) {
            Some(c) if self.open_keys.contains(&Key::Composite(c)) => Key::Composite(c),
            _ => self.normalize(key),
        };
        let was_open = self.open_keys.remove(&key);
        if self.paused() && !was_open {
            return;
        }
        if filter::is_blocked_key(&key) {
            debug!(%key, "Dropped blocked key release");
            return;
        }
        self.push(Event::KeyRelease { time, key });
    }

    /// Fold Ctrl+letter into a composite or a control code
    fn normalize(&self, key: Key) -> Key {
        let code = match key {
            Key::Char(c) if !self.ctrl_down.is_empty() => ControlCode::from_letter(c),
            Key::Control(code) => Some(code),
            _ => None,
        };
        match code {
            Some(code) => match code.composite() {
                Some(composite) => Key::Composite(composite),
                None => Key::Control(code),
            },
            None => key,
        }
    }

    fn push(&mut self, event: Event) {
        if filter::is_blocked(&event) {
            return;
        }
        debug!(%event, "Recorded");
        self.log.push(event);
        self.shared.events.store(self.log.len(), Ordering::SeqCst);
    }
}

fn composite_for(key: &Key) -> Option<Composite> {
    match key {
        Key::Char(c) => ControlCode::from_letter(*c).and_then(ControlCode::composite),
        Key::Control(code) => code.composite(),
        _ => None,
    }
}
