//! Live capture and injection through rdev
//!
//! `rdev::listen` installs one hook per process and cannot be stopped, so the listener
//! thread is started on first use and lives until exit. A [`NativeSource`] only owns
//! the subscription to it: attaching routes input to the recorder's channel and
//! detaching cuts the route.

use crate::input::{forward, Captured, InputSink, InputSource, RawInput};
use autotask_core::keys::{Key, Modifier, NamedKey};
use autotask_core::{Error, MouseButton, Result};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rdev::{Button, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

static SUBSCRIBER: Mutex<Option<Sender<Captured>>> = parking_lot::const_mutex(None);
static LISTENER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Start the process-wide listener once. Errors reported by rdev within the startup
/// window (no display, no permission) are remembered and returned on every call.
fn ensure_listener() -> Result<()> {
    LISTENER
        .get_or_init(|| {
            let (err_tx, err_rx) = bounded::<String>(1);
            let spawned = thread::Builder::new()
                .name("autotask-listener".into())
                .spawn(move || {
                    let mut state = ListenState::default();
                    if let Err(e) = rdev::listen(move |event| state.handle(event)) {
                        error!("rdev listen error: {:?}", e);
                        let _ = err_tx.send(format!("input listener failed: {:?}", e));
                    }
                });
            if let Err(e) = spawned {
                return Err(format!("failed to spawn listener thread: {}", e));
            }
            match err_rx.recv_timeout(Duration::from_millis(250)) {
                Ok(e) => Err(e),
                Err(_) => {
                    info!("Global input listener running");
                    Ok(())
                }
            }
        })
        .clone()
        .map_err(Error::device_unavailable)
}

#[derive(Default)]
struct ListenState {
    pos: (f64, f64),
    /// Key reported on press, reused on release so both ends agree
    pressed: Vec<(rdev::Key, Key)>,
}

impl ListenState {
    fn handle(&mut self, event: rdev::Event) {
        let (x, y) = self.pos;
        let input = match event.event_type {
            EventType::MouseMove { x, y } => {
                self.pos = (x, y);
                Some(RawInput::PointerMove { x, y })
            }
            EventType::ButtonPress(b) => button(b).map(|button| RawInput::PointerButton { x, y, button, pressed: true }),
            EventType::ButtonRelease(b) => button(b).map(|button| RawInput::PointerButton { x, y, button, pressed: false }),
            EventType::Wheel { delta_x, delta_y } => Some(RawInput::PointerScroll { x, y, dx: delta_x, dy: delta_y }),
            EventType::KeyPress(raw) => {
                pressed_key(event.name.as_deref(), raw).map(|key| {
                    self.pressed.retain(|(r, _)| *r != raw);
                    self.pressed.push((raw, key));
                    RawInput::KeyDown(key)
                })
            }
            EventType::KeyRelease(raw) => {
                let remembered = self
                    .pressed
                    .iter()
                    .position(|(r, _)| *r == raw)
                    .map(|i| self.pressed.swap_remove(i).1);
                remembered.or_else(|| key_from_rdev(raw)).map(RawInput::KeyUp)
            }
        };
        if let Some(input) = input {
            forward(&SUBSCRIBER, Captured { at: Instant::now(), input });
        }
    }
}

/// Prefer the layout-resolved text; with Ctrl held it is the control character
fn pressed_key(name: Option<&str>, raw: rdev::Key) -> Option<Key> {
    name.and_then(single_char)
        .and_then(Key::from_char)
        .or_else(|| key_from_rdev(raw))
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn button(b: Button) -> Option<MouseButton> {
    match b {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        Button::Middle => Some(MouseButton::Middle),
        Button::Unknown(_) => None,
    }
}

/// Global keyboard and pointer listener
#[derive(Default)]
pub struct NativeSource {
    attached: AtomicBool,
}

impl NativeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for NativeSource {
    fn attach(&self, tx: Sender<Captured>) -> Result<()> {
        ensure_listener()?;
        let mut slot = SUBSCRIBER.lock();
        if slot.is_some() {
            return Err(Error::already_active("input listener"));
        }
        *slot = Some(tx);
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            SUBSCRIBER.lock().take();
        }
    }
}

impl Drop for NativeSource {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Injects events with `rdev::simulate`
pub struct NativeSink {
    /// Pause after every simulated event; some platforms drop events sent back to back
    delay: Duration,
}

impl NativeSink {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(10))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    fn send(&self, event: &EventType) -> Result<()> {
        rdev::simulate(event)
            .map_err(|_| Error::injection_failed(&format!("{:?}", event), "rejected by the OS"))?;
        thread::sleep(self.delay);
        Ok(())
    }
}

impl Default for NativeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSink for NativeSink {
    fn acquire(&mut self) -> Result<()> {
        rdev::display_size()
            .map(|_| ())
            .map_err(|e| Error::device_unavailable(format!("no display for input injection: {:?}", e)))
    }

    fn move_pointer(&mut self, x: f64, y: f64) -> Result<()> {
        self.send(&EventType::MouseMove { x, y })
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        let b = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        };
        self.send(&if pressed { EventType::ButtonPress(b) } else { EventType::ButtonRelease(b) })
    }

    fn scroll(&mut self, dx: i64, dy: i64) -> Result<()> {
        self.send(&EventType::Wheel { delta_x: dx, delta_y: dy })
    }

    fn key(&mut self, key: &Key, pressed: bool) -> Result<()> {
        let (raw, shift) = key_to_rdev(key)
            .ok_or_else(|| Error::injection_failed(&key.to_string(), "no key code on this layout"))?;
        let event = |k| if pressed { EventType::KeyPress(k) } else { EventType::KeyRelease(k) };
        // Shift wraps the key: down first on press, up last on release
        if shift && pressed {
            self.send(&event(rdev::Key::ShiftLeft))?;
        }
        self.send(&event(raw))?;
        if shift && !pressed {
            self.send(&event(rdev::Key::ShiftLeft))?;
        }
        Ok(())
    }
}

// ============================================================================
// Key tables
// ============================================================================

/// US layout: (unshifted, shifted, key)
const CHAR_KEYS: &[(char, char, rdev::Key)] = &[
    ('a', 'A', rdev::Key::KeyA),
    ('b', 'B', rdev::Key::KeyB),
    ('c', 'C', rdev::Key::KeyC),
    ('d', 'D', rdev::Key::KeyD),
    ('e', 'E', rdev::Key::KeyE),
    ('f', 'F', rdev::Key::KeyF),
    ('g', 'G', rdev::Key::KeyG),
    ('h', 'H', rdev::Key::KeyH),
    ('i', 'I', rdev::Key::KeyI),
    ('j', 'J', rdev::Key::KeyJ),
    ('k', 'K', rdev::Key::KeyK),
    ('l', 'L', rdev::Key::KeyL),
    ('m', 'M', rdev::Key::KeyM),
    ('n', 'N', rdev::Key::KeyN),
    ('o', 'O', rdev::Key::KeyO),
    ('p', 'P', rdev::Key::KeyP),
    ('q', 'Q', rdev::Key::KeyQ),
    ('r', 'R', rdev::Key::KeyR),
    ('s', 'S', rdev::Key::KeyS),
    ('t', 'T', rdev::Key::KeyT),
    ('u', 'U', rdev::Key::KeyU),
    ('v', 'V', rdev::Key::KeyV),
    ('w', 'W', rdev::Key::KeyW),
    ('x', 'X', rdev::Key::KeyX),
    ('y', 'Y', rdev::Key::KeyY),
    ('z', 'Z', rdev::Key::KeyZ),
    ('0', ')', rdev::Key::Num0),
    ('1', '!', rdev::Key::Num1),
    ('2', '@', rdev::Key::Num2),
    ('3', '#', rdev::Key::Num3),
    ('4', '$', rdev::Key::Num4),
    ('5', '%', rdev::Key::Num5),
    ('6', '^', rdev::Key::Num6),
    ('7', '&', rdev::Key::Num7),
    ('8', '*', rdev::Key::Num8),
    ('9', '(', rdev::Key::Num9),
    ('-', '_', rdev::Key::Minus),
    ('=', '+', rdev::Key::Equal),
    ('[', '{', rdev::Key::LeftBracket),
    (']', '}', rdev::Key::RightBracket),
    ('\\', '|', rdev::Key::BackSlash),
    (';', ':', rdev::Key::SemiColon),
    ('\'', '"', rdev::Key::Quote),
    (',', '<', rdev::Key::Comma),
    ('.', '>', rdev::Key::Dot),
    ('/', '?', rdev::Key::Slash),
    ('`', '~', rdev::Key::BackQuote),
];

const NAMED_KEYS: &[(NamedKey, rdev::Key)] = &[
    (NamedKey::Enter, rdev::Key::Return),
    (NamedKey::Esc, rdev::Key::Escape),
    (NamedKey::Tab, rdev::Key::Tab),
    (NamedKey::Space, rdev::Key::Space),
    (NamedKey::Backspace, rdev::Key::Backspace),
    (NamedKey::Delete, rdev::Key::Delete),
    (NamedKey::Insert, rdev::Key::Insert),
    (NamedKey::Up, rdev::Key::UpArrow),
    (NamedKey::Down, rdev::Key::DownArrow),
    (NamedKey::Left, rdev::Key::LeftArrow),
    (NamedKey::Right, rdev::Key::RightArrow),
    (NamedKey::Home, rdev::Key::Home),
    (NamedKey::End, rdev::Key::End),
    (NamedKey::PageUp, rdev::Key::PageUp),
    (NamedKey::PageDown, rdev::Key::PageDown),
    (NamedKey::CapsLock, rdev::Key::CapsLock),
    (NamedKey::NumLock, rdev::Key::NumLock),
    (NamedKey::ScrollLock, rdev::Key::ScrollLock),
    (NamedKey::PrintScreen, rdev::Key::PrintScreen),
    (NamedKey::Pause, rdev::Key::Pause),
    (NamedKey::Cmd, rdev::Key::MetaLeft),
    (NamedKey::F1, rdev::Key::F1),
    (NamedKey::F2, rdev::Key::F2),
    (NamedKey::F3, rdev::Key::F3),
    (NamedKey::F4, rdev::Key::F4),
    (NamedKey::F5, rdev::Key::F5),
    (NamedKey::F6, rdev::Key::F6),
    (NamedKey::F7, rdev::Key::F7),
    (NamedKey::F8, rdev::Key::F8),
    (NamedKey::F9, rdev::Key::F9),
    (NamedKey::F10, rdev::Key::F10),
    (NamedKey::F11, rdev::Key::F11),
    (NamedKey::F12, rdev::Key::F12),
];

/// Key for a raw code when rdev gave no layout-resolved name
fn key_from_rdev(raw: rdev::Key) -> Option<Key> {
    let modifier = match raw {
        rdev::Key::ControlLeft => Some(Modifier::CtrlLeft),
        rdev::Key::ControlRight => Some(Modifier::CtrlRight),
        rdev::Key::ShiftLeft => Some(Modifier::ShiftLeft),
        rdev::Key::ShiftRight => Some(Modifier::ShiftRight),
        rdev::Key::Alt => Some(Modifier::AltLeft),
        rdev::Key::AltGr => Some(Modifier::AltGr),
        _ => None,
    };
    if let Some(m) = modifier {
        return Some(Key::Modifier(m));
    }
    match raw {
        rdev::Key::MetaRight => return Some(Key::Named(NamedKey::Cmd)),
        rdev::Key::KpReturn => return Some(Key::Named(NamedKey::Enter)),
        rdev::Key::KpDelete => return Some(Key::Named(NamedKey::Delete)),
        _ => {}
    }
    if let Some((named, _)) = NAMED_KEYS.iter().find(|(_, r)| *r == raw) {
        return Some(Key::Named(*named));
    }
    CHAR_KEYS
        .iter()
        .find(|(_, _, r)| *r == raw)
        .map(|(c, _, _)| Key::Char(*c))
}

/// Raw code plus whether Shift must be held
fn key_to_rdev(key: &Key) -> Option<(rdev::Key, bool)> {
    match key {
        Key::Char(c) => CHAR_KEYS.iter().find_map(|(lower, upper, raw)| {
            if c == lower {
                Some((*raw, false))
            } else if c == upper {
                Some((*raw, true))
            } else {
                None
            }
        }),
        Key::Named(n) => NAMED_KEYS.iter().find(|(k, _)| k == n).map(|(_, raw)| (*raw, false)),
        Key::Modifier(m) => Some((
            match m {
                Modifier::Ctrl | Modifier::CtrlLeft => rdev::Key::ControlLeft,
                Modifier::CtrlRight => rdev::Key::ControlRight,
                Modifier::Shift | Modifier::ShiftLeft => rdev::Key::ShiftLeft,
                Modifier::ShiftRight => rdev::Key::ShiftRight,
                Modifier::Alt | Modifier::AltLeft => rdev::Key::Alt,
                Modifier::AltRight | Modifier::AltGr => rdev::Key::AltGr,
            },
            false,
        )),
        // Control codes are filtered out and composites are split by the player
        Key::Control(_) | Key::Composite(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotask_core::keys::{Composite, ControlCode};

    #[test]
    fn chars_map_to_key_and_shift() {
        assert_eq!(key_to_rdev(&Key::Char('h')), Some((rdev::Key::KeyH, false)));
        assert_eq!(key_to_rdev(&Key::Char('H')), Some((rdev::Key::KeyH, true)));
        assert_eq!(key_to_rdev(&Key::Char('?')), Some((rdev::Key::Slash, true)));
        assert_eq!(key_to_rdev(&Key::Char('é')), None);
    }

    #[test]
    fn named_and_modifier_keys_round_trip() {
        for (named, raw) in NAMED_KEYS {
            assert_eq!(key_to_rdev(&Key::Named(*named)), Some((*raw, false)));
            assert_eq!(key_from_rdev(*raw), Some(Key::Named(*named)));
        }
        assert_eq!(key_from_rdev(rdev::Key::ControlLeft), Some(Key::Modifier(Modifier::CtrlLeft)));
        assert_eq!(key_to_rdev(&Key::Modifier(Modifier::Ctrl)), Some((rdev::Key::ControlLeft, false)));
    }

    #[test]
    fn ctrl_letter_text_becomes_a_control_code() {
        assert_eq!(pressed_key(Some("\u{13}"), rdev::Key::KeyS), Some(Key::Control(ControlCode::S)));
        assert_eq!(pressed_key(Some("\u{3}"), rdev::Key::KeyC), Some(Key::Control(ControlCode::C)));
        assert_eq!(pressed_key(Some("s"), rdev::Key::KeyS), Some(Key::Char('s')));
        assert_eq!(pressed_key(None, rdev::Key::KeyS), Some(Key::Char('s')));
    }

    #[test]
    fn composites_are_not_injected_directly() {
        assert_eq!(key_to_rdev(&Key::Composite(Composite::CtrlC)), None);
    }
}
