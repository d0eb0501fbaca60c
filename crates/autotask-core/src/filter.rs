//! Blocked-key predicate applied at record time and again before replay
//!
//! Bare modifiers and lone Ctrl+letter control codes are noise that races the
//! operator's own clipboard shortcuts. `ctrl+c` and `ctrl+v` pass as composites.

use crate::events::{Event, EventLog};
use crate::keys::Key;

/// True if `key` must never be recorded or injected
pub fn is_blocked_key(key: &Key) -> bool {
    match key {
        Key::Modifier(_) | Key::Control(_) => true,
        Key::Char(_) | Key::Named(_) | Key::Composite(_) => false,
    }
}

/// True if `event` is a key event carrying a blocked key
pub fn is_blocked(event: &Event) -> bool {
    event.key().map(is_blocked_key).unwrap_or(false)
}

/// Strip blocked events from a log. Returns the clean log and how many were dropped.
pub fn sanitize(log: &EventLog) -> (EventLog, usize) {
    let clean = log.retain(|e| !is_blocked(e));
    let dropped = log.len() - clean.len();
    (clean, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Composite, ControlCode, Modifier, NamedKey};

    #[test]
    fn blocks_modifiers_and_control_codes() {
        for m in [Modifier::Ctrl, Modifier::ShiftLeft, Modifier::AltRight, Modifier::AltGr] {
            assert!(is_blocked_key(&Key::Modifier(m)));
        }
        for c in [ControlCode::A, ControlCode::C, ControlCode::S, ControlCode::V, ControlCode::Z] {
            assert!(is_blocked_key(&Key::Control(c)));
        }
    }

    #[test]
    fn passes_characters_named_keys_and_composites() {
        assert!(!is_blocked_key(&Key::Char('c')));
        assert!(!is_blocked_key(&Key::Named(NamedKey::Enter)));
        assert!(!is_blocked_key(&Key::Composite(Composite::CtrlC)));
        assert!(!is_blocked_key(&Key::Composite(Composite::CtrlV)));
    }

    #[test]
    fn pointer_events_are_never_blocked() {
        let e = Event::PointerMove { time: 0.0, x: 1.0, y: 1.0 };
        assert!(!is_blocked(&e));
    }

    #[test]
    fn sanitize_reports_dropped_count() {
        let log = EventLog::from_json(
            r#"[
                {"type": "key_press", "key": "Key.ctrl", "time": 0.0},
                {"type": "key_press", "key": "h", "time": 0.1},
                {"type": "key_release", "key": "Key.ctrl", "time": 0.2},
                {"type": "key_release", "key": "h", "time": 0.3}
            ]"#,
        )
        .unwrap();
        let (clean, dropped) = sanitize(&log);
        assert_eq!(dropped, 2);
        assert_eq!(clean.len(), 2);
        assert!(clean.iter().all(|e| !is_blocked(e)));
    }
}
