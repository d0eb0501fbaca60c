//! Normalized key identifiers
//!
//! Keys serialize as short symbolic strings: a printable character (`"a"`), a named key
//! (`"enter"`, `"page_up"`), a modifier (`"ctrl_l"`), a caret control code (`"^A"`) or a
//! clipboard composite (`"ctrl+c"`). Parsing also accepts legacy tokens such as
//! `"Key.enter"`, `"'a'"` and `"'\\x03'"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseKeyError {
    #[error("empty key identifier")]
    Empty,
    #[error("unknown key identifier: '{0}'")]
    Unknown(String),
}

/// A single logical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    /// Printable character, layout-resolved (`'A'` and `'a'` are distinct)
    Char(char),
    Named(NamedKey),
    Modifier(Modifier),
    /// Control character produced by Ctrl+letter
    Control(ControlCode),
    /// Recognized Ctrl+letter clipboard combination, recorded as one event
    Composite(Composite),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Esc,
    Tab,
    Space,
    Backspace,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    CapsLock,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
    Menu,
    /// Command / Super / Windows key
    Cmd,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    CtrlLeft,
    CtrlRight,
    Shift,
    ShiftLeft,
    ShiftRight,
    Alt,
    AltLeft,
    AltRight,
    AltGr,
}

/// Ctrl+letter, stored as the uppercase letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlCode(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Composite {
    CtrlC,
    CtrlV,
}

impl Key {
    /// Normalize a character delivered by an input source.
    ///
    /// Whitespace maps to its named key and control characters to their control code.
    /// Returns `None` for control characters with no symbolic meaning here.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Key::Named(NamedKey::Space)),
            '\n' | '\r' => Some(Key::Named(NamedKey::Enter)),
            '\t' => Some(Key::Named(NamedKey::Tab)),
            '\x08' => Some(Key::Named(NamedKey::Backspace)),
            '\x1b' => Some(Key::Named(NamedKey::Esc)),
            '\x7f' => Some(Key::Named(NamedKey::Delete)),
            c if c.is_control() => ControlCode::from_byte(c as u32).map(Key::Control),
            c => Some(Key::Char(c)),
        }
    }

    pub fn is_ctrl(&self) -> bool {
        matches!(self, Key::Modifier(m) if m.is_ctrl())
    }
}

impl NamedKey {
    pub fn name(self) -> &'static str {
        match self {
            NamedKey::Enter => "enter",
            NamedKey::Esc => "esc",
            NamedKey::Tab => "tab",
            NamedKey::Space => "space",
            NamedKey::Backspace => "backspace",
            NamedKey::Delete => "delete",
            NamedKey::Insert => "insert",
            NamedKey::Up => "up",
            NamedKey::Down => "down",
            NamedKey::Left => "left",
            NamedKey::Right => "right",
            NamedKey::Home => "home",
            NamedKey::End => "end",
            NamedKey::PageUp => "page_up",
            NamedKey::PageDown => "page_down",
            NamedKey::CapsLock => "caps_lock",
            NamedKey::NumLock => "num_lock",
            NamedKey::ScrollLock => "scroll_lock",
            NamedKey::PrintScreen => "print_screen",
            NamedKey::Pause => "pause",
            NamedKey::Menu => "menu",
            NamedKey::Cmd => "cmd",
            NamedKey::F1 => "f1",
            NamedKey::F2 => "f2",
            NamedKey::F3 => "f3",
            NamedKey::F4 => "f4",
            NamedKey::F5 => "f5",
            NamedKey::F6 => "f6",
            NamedKey::F7 => "f7",
            NamedKey::F8 => "f8",
            NamedKey::F9 => "f9",
            NamedKey::F10 => "f10",
            NamedKey::F11 => "f11",
            NamedKey::F12 => "f12",
        }
    }

    /// Lowercase name or alias to key
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "enter" | "return" => NamedKey::Enter,
            "esc" | "escape" => NamedKey::Esc,
            "tab" => NamedKey::Tab,
            "space" => NamedKey::Space,
            "backspace" => NamedKey::Backspace,
            "delete" | "del" => NamedKey::Delete,
            "insert" => NamedKey::Insert,
            "up" | "arrow_up" => NamedKey::Up,
            "down" | "arrow_down" => NamedKey::Down,
            "left" | "arrow_left" => NamedKey::Left,
            "right" | "arrow_right" => NamedKey::Right,
            "home" => NamedKey::Home,
            "end" => NamedKey::End,
            "page_up" | "pageup" => NamedKey::PageUp,
            "page_down" | "pagedown" => NamedKey::PageDown,
            "caps_lock" | "capslock" => NamedKey::CapsLock,
            "num_lock" | "numlock" => NamedKey::NumLock,
            "scroll_lock" | "scrolllock" => NamedKey::ScrollLock,
            "print_screen" | "printscreen" => NamedKey::PrintScreen,
            "pause" => NamedKey::Pause,
            "menu" => NamedKey::Menu,
            "cmd" | "cmd_l" | "cmd_r" | "super" | "meta" | "win" => NamedKey::Cmd,
            "f1" => NamedKey::F1,
            "f2" => NamedKey::F2,
            "f3" => NamedKey::F3,
            "f4" => NamedKey::F4,
            "f5" => NamedKey::F5,
            "f6" => NamedKey::F6,
            "f7" => NamedKey::F7,
            "f8" => NamedKey::F8,
            "f9" => NamedKey::F9,
            "f10" => NamedKey::F10,
            "f11" => NamedKey::F11,
            "f12" => NamedKey::F12,
            _ => return None,
        })
    }
}

impl Modifier {
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::CtrlLeft => "ctrl_l",
            Modifier::CtrlRight => "ctrl_r",
            Modifier::Shift => "shift",
            Modifier::ShiftLeft => "shift_l",
            Modifier::ShiftRight => "shift_r",
            Modifier::Alt => "alt",
            Modifier::AltLeft => "alt_l",
            Modifier::AltRight => "alt_r",
            Modifier::AltGr => "alt_gr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ctrl" | "control" => Modifier::Ctrl,
            "ctrl_l" => Modifier::CtrlLeft,
            "ctrl_r" => Modifier::CtrlRight,
            "shift" => Modifier::Shift,
            "shift_l" => Modifier::ShiftLeft,
            "shift_r" => Modifier::ShiftRight,
            "alt" | "option" => Modifier::Alt,
            "alt_l" => Modifier::AltLeft,
            "alt_r" => Modifier::AltRight,
            "alt_gr" => Modifier::AltGr,
            _ => return None,
        })
    }

    pub fn is_ctrl(self) -> bool {
        matches!(self, Modifier::Ctrl | Modifier::CtrlLeft | Modifier::CtrlRight)
    }
}

impl ControlCode {
    pub const A: Self = Self(b'A');
    pub const C: Self = Self(b'C');
    pub const S: Self = Self(b'S');
    pub const V: Self = Self(b'V');
    pub const X: Self = Self(b'X');
    pub const Y: Self = Self(b'Y');
    pub const Z: Self = Self(b'Z');

    /// Map a raw control character (`0x01` for ^A through `0x1a` for ^Z) to its code
    pub fn from_byte(b: u32) -> Option<Self> {
        match b {
            0x01..=0x1a => Some(Self(b'A' + (b - 1) as u8)),
            _ => None,
        }
    }

    /// Map the letter typed while Ctrl is held
    pub fn from_letter(c: char) -> Option<Self> {
        c.is_ascii_alphabetic().then(|| Self(c.to_ascii_uppercase() as u8))
    }

    pub fn letter(self) -> char {
        self.0 as char
    }

    /// The clipboard composite this control code stands for, if any
    pub fn composite(self) -> Option<Composite> {
        match self {
            ControlCode::C => Some(Composite::CtrlC),
            ControlCode::V => Some(Composite::CtrlV),
            _ => None,
        }
    }
}

impl Composite {
    pub fn name(self) -> &'static str {
        match self {
            Composite::CtrlC => "ctrl+c",
            Composite::CtrlV => "ctrl+v",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ctrl+c" | "ctrl_c" => Some(Composite::CtrlC),
            "ctrl+v" | "ctrl_v" => Some(Composite::CtrlV),
            _ => None,
        }
    }

    /// Modifier and key that make up the combination, in press order
    pub fn constituents(self) -> (Key, Key) {
        let letter = match self {
            Composite::CtrlC => 'c',
            Composite::CtrlV => 'v',
        };
        (Key::Modifier(Modifier::Ctrl), Key::Char(letter))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(n) => f.write_str(n.name()),
            Key::Modifier(m) => f.write_str(m.name()),
            Key::Control(c) => write!(f, "^{}", c.letter()),
            Key::Composite(c) => f.write_str(c.name()),
        }
    }
}

impl FromStr for Key {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseKeyError::Empty);
        }
        let unknown = || ParseKeyError::Unknown(s.to_string());

        let token = s.strip_prefix("Key.").unwrap_or(s);
        let token = token
            .strip_prefix("KeyCode.from_char(")
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(token);
        if let Some(inner) = unquote(token) {
            return parse_quoted(inner).ok_or_else(unknown);
        }

        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Key::from_char(c).ok_or_else(unknown);
        }

        let lower = token.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix('^') {
            let mut letters = rest.chars();
            return match (letters.next(), letters.next()) {
                (Some(c), None) => ControlCode::from_letter(c).map(Key::Control).ok_or_else(unknown),
                _ => Err(unknown()),
            };
        }
        if let Some(c) = Composite::from_name(&lower) {
            return Ok(Key::Composite(c));
        }
        if let Some(m) = Modifier::from_name(&lower) {
            return Ok(Key::Modifier(m));
        }
        NamedKey::from_name(&lower).map(Key::Named).ok_or_else(unknown)
    }
}

fn unquote(token: &str) -> Option<&str> {
    if token.len() < 3 {
        return None;
    }
    token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
}

/// Legacy `repr()`-style character: `a`, `\\`, `\x03`
fn parse_quoted(inner: &str) -> Option<Key> {
    if let Some(hex) = inner.strip_prefix("\\x") {
        let byte = u32::from_str_radix(hex, 16).ok()?;
        let code = ControlCode::from_byte(byte)?;
        // ^C / ^V in legacy logs are the clipboard shortcuts
        return Some(match code.composite() {
            Some(composite) => Key::Composite(composite),
            None => Key::Control(code),
        });
    }
    match inner {
        "\\\\" => Some(Key::Char('\\')),
        "\\'" => Some(Key::Char('\'')),
        _ => {
            let mut chars = inner.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::from_char(c),
                _ => None,
            }
        }
    }
}

impl TryFrom<String> for Key {
    type Error = ParseKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        s.parse().unwrap()
    }

    #[test]
    fn parses_canonical_tokens() {
        assert_eq!(key("a"), Key::Char('a'));
        assert_eq!(key("A"), Key::Char('A'));
        assert_eq!(key("enter"), Key::Named(NamedKey::Enter));
        assert_eq!(key("page_down"), Key::Named(NamedKey::PageDown));
        assert_eq!(key("ctrl_l"), Key::Modifier(Modifier::CtrlLeft));
        assert_eq!(key("^Z"), Key::Control(ControlCode::Z));
        assert_eq!(key("ctrl+v"), Key::Composite(Composite::CtrlV));
        assert_eq!(key("F10"), Key::Named(NamedKey::F10));
    }

    #[test]
    fn display_round_trips() {
        let keys = [
            Key::Char('h'),
            Key::Char('^'),
            Key::Char('+'),
            Key::Named(NamedKey::Esc),
            Key::Named(NamedKey::Space),
            Key::Modifier(Modifier::AltGr),
            Key::Control(ControlCode::A),
            Key::Composite(Composite::CtrlC),
        ];
        for k in keys {
            assert_eq!(k.to_string().parse::<Key>().unwrap(), k, "{}", k);
        }
    }

    #[test]
    fn parses_legacy_tokens() {
        assert_eq!(key("Key.ctrl"), Key::Modifier(Modifier::Ctrl));
        assert_eq!(key("Key.shift_r"), Key::Modifier(Modifier::ShiftRight));
        assert_eq!(key("Key.space"), Key::Named(NamedKey::Space));
        assert_eq!(key("'h'"), Key::Char('h'));
        assert_eq!(key("'\\x01'"), Key::Control(ControlCode::A));
        assert_eq!(key("'\\x1a'"), Key::Control(ControlCode::Z));
        assert_eq!(key("'\\x03'"), Key::Composite(Composite::CtrlC));
        assert_eq!(key("'\\x16'"), Key::Composite(Composite::CtrlV));
        assert_eq!(key("\"'\""), Key::Char('\''));
        assert_eq!(key("KeyCode.from_char('a')"), Key::Char('a'));
        assert_eq!(key("KeyCode.from_char('\\x13')"), Key::Control(ControlCode::S));
    }

    #[test]
    fn whitespace_and_control_chars_are_normalized() {
        assert_eq!(Key::from_char(' '), Some(Key::Named(NamedKey::Space)));
        assert_eq!(Key::from_char('\r'), Some(Key::Named(NamedKey::Enter)));
        assert_eq!(Key::from_char('\u{3}'), Some(Key::Control(ControlCode::C)));
        assert_eq!(Key::from_char('\u{13}'), Some(Key::Control(ControlCode::S)));
        assert_eq!(Key::from_char('\u{0}'), None);
        assert_eq!(Key::from_char('\u{1c}'), None);
    }

    #[test]
    fn every_ctrl_letter_has_a_control_code() {
        for c in 'a'..='z' {
            let code = ControlCode::from_letter(c).unwrap();
            assert_eq!(code.letter(), c.to_ascii_uppercase());
            assert_eq!(ControlCode::from_byte(c as u32 - 'a' as u32 + 1), Some(code));
            assert_eq!(key(&format!("^{}", c)), Key::Control(code));
        }
        assert_eq!(ControlCode::from_letter('1'), None);
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert_eq!("".parse::<Key>(), Err(ParseKeyError::Empty));
        assert!(matches!("hyper".parse::<Key>(), Err(ParseKeyError::Unknown(_))));
        assert!(matches!("^1".parse::<Key>(), Err(ParseKeyError::Unknown(_))));
        assert!(matches!("<65437>".parse::<Key>(), Err(ParseKeyError::Unknown(_))));
    }

    #[test]
    fn composite_constituents_are_ctrl_then_letter() {
        let (modifier, letter) = Composite::CtrlV.constituents();
        assert!(modifier.is_ctrl());
        assert_eq!(letter, Key::Char('v'));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Key::Composite(Composite::CtrlC)).unwrap();
        assert_eq!(json, "\"ctrl+c\"");
        let back: Key = serde_json::from_str("\"Key.enter\"").unwrap();
        assert_eq!(back, Key::Named(NamedKey::Enter));
    }
}
