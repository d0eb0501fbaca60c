//! Input surfaces consumed by the engine
//!
//! An [`InputSource`] pushes captured pointer and key input into a channel owned by the
//! recorder. An [`InputSink`] applies events during playback. Both are implemented by
//! the native rdev backend and by the in-process doubles below.

use autotask_core::{Error, Key, MouseButton, Result};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Raw input as delivered by a source, before filtering
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    PointerMove { x: f64, y: f64 },
    PointerButton { x: f64, y: f64, button: MouseButton, pressed: bool },
    PointerScroll { x: f64, y: f64, dx: i64, dy: i64 },
    KeyDown(Key),
    KeyUp(Key),
}

/// Input stamped with the instant the callback fired
#[derive(Debug, Clone)]
pub struct Captured {
    pub at: Instant,
    pub input: RawInput,
}

/// Push-based listener. Exclusive: a second `attach` fails until `detach`.
pub trait InputSource: Send + Sync {
    fn attach(&self, tx: Sender<Captured>) -> Result<()>;

    /// Stop delivering input. Idempotent.
    fn detach(&self);
}

/// Injection surface used by the player
pub trait InputSink: Send {
    /// Called once before a playback session starts
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when a playback session ends, on every exit path
    fn release(&mut self) {}

    fn move_pointer(&mut self, x: f64, y: f64) -> Result<()>;
    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()>;
    fn scroll(&mut self, dx: i64, dy: i64) -> Result<()>;
    fn key(&mut self, key: &Key, pressed: bool) -> Result<()>;
}

/// Forward a captured input to an attached channel. Returns false when nothing is
/// listening or the channel is full.
pub(crate) fn forward(slot: &Mutex<Option<Sender<Captured>>>, captured: Captured) -> bool {
    let slot = slot.lock();
    let Some(tx) = slot.as_ref() else {
        return false;
    };
    match tx.try_send(captured) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Capture channel full, dropping input");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Programmatic input source.
///
/// Lets an external UI, a scripted driver or a test feed the recorder through the
/// same callback surface a device listener would.
#[derive(Default)]
pub struct LoopbackSource {
    tx: Mutex<Option<Sender<Captured>>>,
}

impl LoopbackSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.tx.lock().is_some()
    }

    pub fn on_pointer_move(&self, x: f64, y: f64) -> bool {
        self.emit(RawInput::PointerMove { x, y })
    }

    pub fn on_pointer_button(&self, x: f64, y: f64, button: MouseButton, pressed: bool) -> bool {
        self.emit(RawInput::PointerButton { x, y, button, pressed })
    }

    pub fn on_pointer_scroll(&self, x: f64, y: f64, dx: i64, dy: i64) -> bool {
        self.emit(RawInput::PointerScroll { x, y, dx, dy })
    }

    pub fn on_key_down(&self, key: Key) -> bool {
        self.emit(RawInput::KeyDown(key))
    }

    pub fn on_key_up(&self, key: Key) -> bool {
        self.emit(RawInput::KeyUp(key))
    }

    /// Deliver input stamped now
    pub fn emit(&self, input: RawInput) -> bool {
        self.emit_at(Instant::now(), input)
    }

    /// Deliver input with an explicit capture instant
    pub fn emit_at(&self, at: Instant, input: RawInput) -> bool {
        forward(&self.tx, Captured { at, input })
    }
}

impl InputSource for LoopbackSource {
    fn attach(&self, tx: Sender<Captured>) -> Result<()> {
        let mut slot = self.tx.lock();
        if slot.is_some() {
            return Err(Error::already_active("input listener"));
        }
        *slot = Some(tx);
        Ok(())
    }

    fn detach(&self) {
        self.tx.lock().take();
    }
}

/// Operation applied to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    MovePointer { x: f64, y: f64 },
    Button { button: MouseButton, pressed: bool },
    Scroll { dx: i64, dy: i64 },
    Key { key: Key, pressed: bool },
}

#[derive(Debug, Clone)]
pub struct Injected {
    pub at: Instant,
    pub op: SinkOp,
}

#[derive(Default)]
struct CaptureState {
    log: Mutex<Vec<Injected>>,
    fail_keys: Mutex<Vec<Key>>,
    acquired: AtomicBool,
    acquisitions: Mutex<usize>,
    unavailable: AtomicBool,
}

/// Sink that records every operation instead of touching a device.
///
/// Clones share the same log, so a test can keep one handle while the player owns
/// another.
#[derive(Clone, Default)]
pub struct CaptureSink {
    state: Arc<CaptureState>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `acquire` always fails
    pub fn unavailable() -> Self {
        let sink = Self::default();
        sink.state.unavailable.store(true, Ordering::SeqCst);
        sink
    }

    /// Make every injection of `key` fail
    pub fn fail_on_key(&self, key: Key) {
        self.state.fail_keys.lock().push(key);
    }

    pub fn injected(&self) -> Vec<Injected> {
        self.state.log.lock().clone()
    }

    pub fn ops(&self) -> Vec<SinkOp> {
        self.state.log.lock().iter().map(|i| i.op.clone()).collect()
    }

    pub fn clear(&self) {
        self.state.log.lock().clear();
    }

    pub fn is_acquired(&self) -> bool {
        self.state.acquired.load(Ordering::SeqCst)
    }

    /// Number of successful `acquire` calls so far
    pub fn acquisitions(&self) -> usize {
        *self.state.acquisitions.lock()
    }

    fn push(&self, op: SinkOp) {
        self.state.log.lock().push(Injected { at: Instant::now(), op });
    }
}

impl InputSink for CaptureSink {
    fn acquire(&mut self) -> Result<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(Error::device_unavailable("capture sink marked unavailable"));
        }
        self.state.acquired.store(true, Ordering::SeqCst);
        *self.state.acquisitions.lock() += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.state.acquired.store(false, Ordering::SeqCst);
    }

    fn move_pointer(&mut self, x: f64, y: f64) -> Result<()> {
        self.push(SinkOp::MovePointer { x, y });
        Ok(())
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        self.push(SinkOp::Button { button, pressed });
        Ok(())
    }

    fn scroll(&mut self, dx: i64, dy: i64) -> Result<()> {
        self.push(SinkOp::Scroll { dx, dy });
        Ok(())
    }

    fn key(&mut self, key: &Key, pressed: bool) -> Result<()> {
        if self.state.fail_keys.lock().contains(key) {
            return Err(Error::injection_failed(&key.to_string(), "rejected by capture sink"));
        }
        self.push(SinkOp::Key { key: *key, pressed });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn loopback_is_exclusive() {
        let source = LoopbackSource::new();
        let (tx, _rx) = bounded(4);
        source.attach(tx.clone()).unwrap();
        assert!(source.attach(tx).is_err());
        source.detach();
        source.detach();
        assert!(!source.is_attached());
    }

    #[test]
    fn loopback_drops_input_when_detached() {
        let source = LoopbackSource::new();
        assert!(!source.on_key_down(Key::Char('a')));

        let (tx, rx) = bounded(4);
        source.attach(tx).unwrap();
        assert!(source.on_pointer_move(1.0, 2.0));
        let captured = rx.try_recv().unwrap();
        assert_eq!(captured.input, RawInput::PointerMove { x: 1.0, y: 2.0 });
    }

    #[test]
    fn loopback_reports_full_channel() {
        let source = LoopbackSource::new();
        let (tx, _rx) = bounded(1);
        source.attach(tx).unwrap();
        assert!(source.on_key_down(Key::Char('a')));
        assert!(!source.on_key_down(Key::Char('b')));
    }

    #[test]
    fn capture_sink_shares_log_between_clones() {
        let sink = CaptureSink::new();
        let mut owned: Box<dyn InputSink> = Box::new(sink.clone());
        owned.acquire().unwrap();
        owned.key(&Key::Char('x'), true).unwrap();
        assert!(sink.is_acquired());
        owned.release();
        assert!(!sink.is_acquired());
        assert_eq!(sink.ops(), vec![SinkOp::Key { key: Key::Char('x'), pressed: true }]);
    }

    #[test]
    fn capture_sink_failures() {
        let mut sink = CaptureSink::unavailable();
        assert!(sink.acquire().is_err());

        let mut sink = CaptureSink::new();
        sink.fail_on_key(Key::Char('q'));
        assert!(sink.key(&Key::Char('q'), true).is_err());
        assert!(sink.ops().is_empty());
    }
}
