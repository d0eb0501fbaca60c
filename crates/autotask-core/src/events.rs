//! Event types and the ordered event log
//!
//! Events serialize as flat records tagged by `type`, one of `mouse_move`,
//! `mouse_click`, `mouse_scroll`, `key_press` or `key_release`. Every record carries
//! `time`, in seconds since the start of the recording session.

use crate::error::{Error, Result};
use crate::keys::Key;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tracing::warn;

/// Single input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Pointer moved to absolute x, y
    #[serde(rename = "mouse_move")]
    PointerMove { time: f64, x: f64, y: f64 },

    /// Button pressed or released at x, y
    #[serde(rename = "mouse_click")]
    PointerButton {
        time: f64,
        x: f64,
        y: f64,
        button: MouseButton,
        pressed: bool,
    },

    /// Wheel scrolled by dx, dy at x, y
    #[serde(rename = "mouse_scroll")]
    PointerScroll {
        time: f64,
        x: f64,
        y: f64,
        dx: i64,
        dy: i64,
    },

    #[serde(rename = "key_press")]
    KeyPress { time: f64, key: Key },

    #[serde(rename = "key_release")]
    KeyRelease { time: f64, key: Key },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[serde(alias = "Button.left")]
    Left,
    #[serde(alias = "Button.right")]
    Right,
    #[serde(alias = "Button.middle")]
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        })
    }
}

impl Event {
    pub fn time(&self) -> f64 {
        match self {
            Event::PointerMove { time, .. }
            | Event::PointerButton { time, .. }
            | Event::PointerScroll { time, .. }
            | Event::KeyPress { time, .. }
            | Event::KeyRelease { time, .. } => *time,
        }
    }

    /// Copy of this event at a different timestamp
    pub fn with_time(mut self, t: f64) -> Self {
        match &mut self {
            Event::PointerMove { time, .. }
            | Event::PointerButton { time, .. }
            | Event::PointerScroll { time, .. }
            | Event::KeyPress { time, .. }
            | Event::KeyRelease { time, .. } => *time = t,
        }
        self
    }

    /// Key carried by a key event
    pub fn key(&self) -> Option<&Key> {
        match self {
            Event::KeyPress { key, .. } | Event::KeyRelease { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Pointer position carried by a pointer event
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            Event::PointerMove { x, y, .. }
            | Event::PointerButton { x, y, .. }
            | Event::PointerScroll { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }

    pub fn is_pointer_move(&self) -> bool {
        matches!(self, Event::PointerMove { .. })
    }

    /// Wire name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Event::PointerMove { .. } => "mouse_move",
            Event::PointerButton { .. } => "mouse_click",
            Event::PointerScroll { .. } => "mouse_scroll",
            Event::KeyPress { .. } => "key_press",
            Event::KeyRelease { .. } => "key_release",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PointerMove { time, x, y } => {
                write!(f, "{:>8.3}s  move    ({}, {})", time, x, y)
            }
            Event::PointerButton { time, x, y, button, pressed } => {
                let action = if *pressed { "down" } else { "up" };
                write!(f, "{:>8.3}s  {} {}  ({}, {})", time, button, action, x, y)
            }
            Event::PointerScroll { time, x, y, dx, dy } => {
                write!(f, "{:>8.3}s  scroll  ({}, {}) by ({}, {})", time, x, y, dx, dy)
            }
            Event::KeyPress { time, key } => write!(f, "{:>8.3}s  press   {}", time, key),
            Event::KeyRelease { time, key } => write!(f, "{:>8.3}s  release {}", time, key),
        }
    }
}

/// Ordered event sequence with non-decreasing, finite, non-negative timestamps.
///
/// The invariant is checked on every way in (`TryFrom`, deserialization) and kept by
/// `push` and the editing methods, so a log handed to the player never needs
/// re-validation. Deserialization skips key events whose key token is not recognised.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Vec<serde_json::Value>")]
pub struct EventLog(Vec<Event>);

/// Per-kind event counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogStats {
    pub total_events: usize,
    pub duration: f64,
    pub pointer_moves: usize,
    pub pointer_buttons: usize,
    pub pointer_scrolls: usize,
    pub key_presses: usize,
    pub key_releases: usize,
}

impl LogStats {
    pub fn pointer_events(&self) -> usize {
        self.pointer_moves + self.pointer_buttons + self.pointer_scrolls
    }

    pub fn key_events(&self) -> usize {
        self.key_presses + self.key_releases
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an event, clamping its time so the log stays ordered
    pub fn push(&mut self, event: Event) {
        let floor = self.0.last().map(Event::time).unwrap_or(0.0);
        let t = event.time();
        let event = if t.is_finite() && t >= floor {
            event
        } else {
            event.with_time(floor)
        };
        self.0.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.0
    }

    /// Timestamp of the last event, 0 for an empty log
    pub fn duration(&self) -> f64 {
        self.0.last().map(Event::time).unwrap_or(0.0)
    }

    pub fn stats(&self) -> LogStats {
        let mut stats = LogStats {
            total_events: self.len(),
            duration: self.duration(),
            ..Default::default()
        };
        for e in &self.0 {
            match e {
                Event::PointerMove { .. } => stats.pointer_moves += 1,
                Event::PointerButton { .. } => stats.pointer_buttons += 1,
                Event::PointerScroll { .. } => stats.pointer_scrolls += 1,
                Event::KeyPress { .. } => stats.key_presses += 1,
                Event::KeyRelease { .. } => stats.key_releases += 1,
            }
        }
        stats
    }

    /// Keep only the events matching `keep`. Order and timestamps are untouched.
    pub fn retain(&self, mut keep: impl FnMut(&Event) -> bool) -> Self {
        Self(self.0.iter().filter(|e| keep(e)).cloned().collect())
    }

    /// Multiply every timestamp by `factor` (0.5 halves the run time)
    pub fn scale_timing(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::invalid_configuration(format!(
                "timing factor must be a positive number, got {}",
                factor
            )));
        }
        Ok(Self(
            self.0
                .iter()
                .map(|e| e.clone().with_time(e.time() * factor))
                .collect(),
        ))
    }

    pub fn without_pointer_moves(&self) -> Self {
        self.retain(|e| !e.is_pointer_move())
    }

    /// Drop pointer moves closer than `threshold` pixels to the last kept move.
    /// The first move is always kept.
    pub fn thin_pointer_moves(&self, threshold: f64) -> Self {
        let mut last: Option<(f64, f64)> = None;
        self.retain(|e| match e {
            Event::PointerMove { x, y, .. } => match last {
                Some((lx, ly)) if (x - lx).hypot(y - ly) < threshold => false,
                _ => {
                    last = Some((*x, *y));
                    true
                }
            },
            _ => true,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        Self::try_from(records)
    }

    // ── Editing ─────────────────────────────────────────────────────────────

    pub fn get(&self, index: usize) -> Result<&Event> {
        self.0
            .get(index)
            .ok_or_else(|| Error::no_such_event(index, self.len()))
    }

    pub fn delete_event(&mut self, index: usize) -> Result<Event> {
        self.get(index)?;
        Ok(self.0.remove(index))
    }

    /// Insert before `index` (`index == len` appends). The event's time must lie
    /// between its new neighbours.
    pub fn insert_event(&mut self, index: usize, event: Event) -> Result<()> {
        if index > self.len() {
            return Err(Error::no_such_event(index, self.len()));
        }
        self.check_fits(event.time(), index.checked_sub(1), index)?;
        self.0.insert(index, event);
        Ok(())
    }

    /// Replace the event at `index`, returning the old one
    pub fn modify_event(&mut self, index: usize, event: Event) -> Result<Event> {
        self.get(index)?;
        self.check_fits(event.time(), index.checked_sub(1), index + 1)?;
        Ok(std::mem::replace(&mut self.0[index], event))
    }

    /// Shift the event at `index` and everything after it by `seconds`.
    /// A negative delay may close the gap to the previous event but not cross it.
    pub fn add_delay(&mut self, index: usize, seconds: f64) -> Result<()> {
        let t = self.get(index)?.time() + seconds;
        if !seconds.is_finite() {
            return Err(Error::invalid_configuration(format!(
                "delay must be a finite number of seconds, got {}",
                seconds
            )));
        }
        self.check_fits(t, index.checked_sub(1), self.len())?;
        self.shift_from(index, seconds);
        Ok(())
    }

    /// Copy the event at `index` to `offset` seconds after it. Later events move
    /// back by the same offset so their gaps are kept.
    pub fn duplicate_event(&mut self, index: usize, offset: f64) -> Result<()> {
        let original = self.get(index)?.clone();
        if !offset.is_finite() || offset < 0.0 {
            return Err(Error::invalid_configuration(format!(
                "duplicate offset must be a non-negative number of seconds, got {}",
                offset
            )));
        }
        self.shift_from(index + 1, offset);
        let t = original.time() + offset;
        self.0.insert(index + 1, original.with_time(t));
        Ok(())
    }

    fn shift_from(&mut self, index: usize, seconds: f64) {
        for e in self.0.iter_mut().skip(index) {
            *e = e.clone().with_time(e.time() + seconds);
        }
    }

    /// `t` must not precede the event at `after` nor follow the one at `before`
    fn check_fits(&self, t: f64, after: Option<usize>, before: usize) -> Result<()> {
        let lo = after.map(|i| self.0[i].time()).unwrap_or(0.0);
        let hi = self.0.get(before).map(Event::time).unwrap_or(f64::INFINITY);
        if t.is_finite() && t >= lo && t <= hi {
            Ok(())
        } else {
            Err(Error::invalid_log(format!(
                "time {}s is outside {}s..{}s allowed at this position",
                t, lo, hi
            )))
        }
    }
}

impl TryFrom<Vec<Event>> for EventLog {
    type Error = Error;

    fn try_from(events: Vec<Event>) -> Result<Self> {
        let mut prev = 0.0_f64;
        for (i, e) in events.iter().enumerate() {
            let t = e.time();
            if !t.is_finite() || t < 0.0 {
                return Err(Error::invalid_log(format!(
                    "event {} has invalid time {}",
                    i, t
                )));
            }
            if t < prev {
                return Err(Error::invalid_log(format!(
                    "event {} at {}s is earlier than the previous event at {}s",
                    i, t, prev
                )));
            }
            prev = t;
        }
        Ok(Self(events))
    }
}

impl TryFrom<Vec<serde_json::Value>> for EventLog {
    type Error = Error;

    fn try_from(records: Vec<serde_json::Value>) -> Result<Self> {
        let mut events: Vec<Event> = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            if let Some(token) = unknown_key(&record) {
                warn!(index = i, key = token, "Skipping key event with unrecognised key");
                continue;
            }
            let event = serde_json::from_value(record)
                .map_err(|e| Error::invalid_log(format!("event {}: {}", i, e)))?;
            events.push(event);
        }
        Self::try_from(events)
    }
}

/// Key token of a key event whose key cannot be parsed
fn unknown_key(record: &serde_json::Value) -> Option<&str> {
    match record.get("type")?.as_str()? {
        "key_press" | "key_release" => {}
        _ => return None,
    }
    let token = record.get("key")?.as_str()?;
    token.parse::<Key>().is_err().then_some(token)
}

impl Serialize for EventLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::keys::{Composite, Modifier};

    fn press(t: f64, c: char) -> Event {
        Event::KeyPress { time: t, key: Key::Char(c) }
    }

    fn mv(t: f64, x: f64, y: f64) -> Event {
        Event::PointerMove { time: t, x, y }
    }

    #[test]
    fn serializes_flat_tagged_records() {
        let e = Event::PointerButton {
            time: 1.5,
            x: 10.0,
            y: 20.0,
            button: MouseButton::Right,
            pressed: true,
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "mouse_click");
        assert_eq!(v["time"], 1.5);
        assert_eq!(v["button"], "right");
        assert_eq!(v["pressed"], true);
    }

    #[test]
    fn reads_legacy_records() {
        let json = r#"[
            {"type": "mouse_click", "x": 100, "y": 200, "button": "Button.left", "pressed": true, "time": 0.5},
            {"type": "key_press", "key": "Key.shift", "time": 0.75},
            {"type": "key_press", "key": "'\\x16'", "time": 1.0}
        ]"#;
        let log = EventLog::from_json(json).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.events()[0],
            Event::PointerButton { time: 0.5, x: 100.0, y: 200.0, button: MouseButton::Left, pressed: true }
        );
        assert_eq!(log.events()[1].key(), Some(&Key::Modifier(Modifier::Shift)));
        assert_eq!(log.events()[2].key(), Some(&Key::Composite(Composite::CtrlV)));
    }

    #[test]
    fn unrecognised_keys_are_skipped_not_fatal() {
        let json = r#"[
            {"type": "key_press", "key": "KeyCode.from_char('a')", "time": 0.1},
            {"type": "key_press", "key": "<65437>", "time": 0.2},
            {"type": "key_release", "key": "<65437>", "time": 0.3},
            {"type": "key_release", "key": "'a'", "time": 0.4}
        ]"#;
        let log = EventLog::from_json(json).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0], press(0.1, 'a'));
        assert_eq!(log.events()[1], Event::KeyRelease { time: 0.4, key: Key::Char('a') });

        let err = EventLog::from_json(r#"[{"type": "mouse_click", "x": 1, "y": 2, "time": 0}]"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLog);
        assert!(err.message.starts_with("event 0"), "{}", err.message);
    }

    #[test]
    fn json_round_trip_preserves_log() {
        let log = EventLog::try_from(vec![
            mv(0.0, 1.25, 2.5),
            Event::PointerScroll { time: 0.1, x: 3.0, y: 4.0, dx: 0, dy: -2 },
            Event::KeyPress { time: 0.2, key: Key::Composite(Composite::CtrlC) },
            Event::KeyRelease { time: 0.3, key: Key::Composite(Composite::CtrlC) },
            press(0.1 + 0.2, 'x'),
        ])
        .unwrap();
        let back = EventLog::from_json(&log.to_json().unwrap()).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn rejects_decreasing_or_invalid_times() {
        let err = EventLog::try_from(vec![press(1.0, 'a'), press(0.5, 'b')]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLog);
        assert!(EventLog::try_from(vec![press(-0.1, 'a')]).is_err());
        assert!(EventLog::try_from(vec![press(f64::NAN, 'a')]).is_err());
        assert!(EventLog::from_json(r#"[{"type":"key_press","key":"a","time":2},{"type":"key_press","key":"b","time":1}]"#).is_err());
    }

    #[test]
    fn push_clamps_out_of_order_times() {
        let mut log = EventLog::new();
        log.push(press(0.5, 'a'));
        log.push(press(0.2, 'b'));
        assert_eq!(log.events()[1].time(), 0.5);
    }

    #[test]
    fn stats_and_duration() {
        let log = EventLog::try_from(vec![mv(0.0, 0.0, 0.0), press(0.5, 'a'), press(2.0, 'b')]).unwrap();
        let stats = log.stats();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.pointer_moves, 1);
        assert_eq!(stats.key_presses, 2);
        assert_eq!(stats.duration, 2.0);
        assert_eq!(EventLog::new().duration(), 0.0);
    }

    #[test]
    fn scale_timing_requires_positive_factor() {
        let log = EventLog::try_from(vec![press(1.0, 'a'), press(3.0, 'b')]).unwrap();
        let half = log.scale_timing(0.5).unwrap();
        assert_eq!(half.duration(), 1.5);
        assert!(log.scale_timing(0.0).is_err());
        assert!(log.scale_timing(-2.0).is_err());
    }

    #[test]
    fn thins_small_pointer_moves() {
        let log = EventLog::try_from(vec![
            mv(0.0, 0.0, 0.0),
            mv(0.1, 3.0, 0.0),
            mv(0.2, 3.0, 4.0),
            press(0.3, 'a'),
            mv(0.4, 4.0, 4.0),
        ])
        .unwrap();
        let thinned = log.thin_pointer_moves(5.0);
        assert_eq!(thinned.len(), 3);
        assert_eq!(thinned.events()[1], mv(0.2, 3.0, 4.0));
        assert_eq!(log.without_pointer_moves().len(), 1);
    }

    fn abc() -> EventLog {
        EventLog::try_from(vec![press(0.0, 'a'), press(1.0, 'b'), press(2.0, 'c')]).unwrap()
    }

    fn times(log: &EventLog) -> Vec<f64> {
        log.iter().map(Event::time).collect()
    }

    #[test]
    fn delete_and_insert_keep_order() {
        let mut log = abc();
        assert_eq!(log.delete_event(1).unwrap(), press(1.0, 'b'));
        assert_eq!(log.delete_event(5).unwrap_err().code, ErrorCode::NotFound);

        log.insert_event(1, press(1.5, 'x')).unwrap();
        log.insert_event(3, press(2.5, 'y')).unwrap();
        assert_eq!(times(&log), vec![0.0, 1.5, 2.0, 2.5]);

        let err = log.insert_event(1, press(2.2, 'z')).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLog);
        assert!(log.insert_event(9, press(3.0, 'z')).is_err());
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn modify_replaces_within_neighbours() {
        let mut log = abc();
        let old = log.modify_event(1, Event::KeyRelease { time: 1.2, key: Key::Char('a') }).unwrap();
        assert_eq!(old, press(1.0, 'b'));
        assert_eq!(log.events()[1].kind(), "key_release");
        assert!(log.modify_event(1, press(2.5, 'b')).is_err());
        assert!(log.modify_event(3, press(3.0, 'b')).is_err());
        assert_eq!(log.events()[1].time(), 1.2);
    }

    #[test]
    fn add_delay_shifts_the_rest_of_the_log() {
        let mut log = abc();
        log.add_delay(1, 0.5).unwrap();
        assert_eq!(times(&log), vec![0.0, 1.5, 2.5]);
        log.add_delay(1, -1.5).unwrap();
        assert_eq!(times(&log), vec![0.0, 0.0, 1.0]);
        assert!(log.add_delay(2, -2.0).is_err());
        assert!(log.add_delay(0, f64::NAN).is_err());
        assert!(log.add_delay(3, 1.0).is_err());
        assert_eq!(times(&log), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn duplicate_inserts_copy_after_original() {
        let mut log = abc();
        log.duplicate_event(1, 0.25).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log.events()[2], press(1.25, 'b'));
        assert_eq!(times(&log), vec![0.0, 1.0, 1.25, 2.25]);
        assert!(log.duplicate_event(0, -1.0).is_err());
        assert!(log.duplicate_event(4, 0.1).is_err());
    }
}
