//! Structured errors shared by the recorder, the player and the store

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A recording or playback session is already running on this engine.
    AlreadyActive,
    /// `play` was called without a loaded event log.
    NothingLoaded,
    /// Speed or repeat count out of range.
    InvalidConfiguration,
    /// A single event could not be applied to the input sink.
    InjectionFailed,
    DuplicateName,
    NotFound,
    /// The input listener or injector could not be acquired.
    DeviceUnavailable,
    /// A serialized event log violates the log invariants.
    InvalidLog,
    Storage,
    /// Playback was cancelled before it finished.
    Cancelled,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn already_active(what: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyActive,
            format!("A {} session is already active", what),
        )
        .with_suggestions(vec![format!("Stop the running {} session first", what)])
    }

    pub fn nothing_loaded() -> Self {
        Self::new(ErrorCode::NothingLoaded, "No event log loaded for playback")
            .with_suggestions(vec!["Call load() with a recorded event log before play()".into()])
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, reason)
    }

    pub fn injection_failed(event: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InjectionFailed,
            format!("Injecting {} failed: {}", event, reason),
        )
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateName,
            format!("An automation named '{}' already exists", name),
        )
        .with_suggestions(vec![
            "Pick a different name".into(),
            "Delete the existing automation first".into(),
        ])
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Automation not found: {}", name))
    }

    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeviceUnavailable, reason).with_suggestions(vec![
            "Grant input monitoring / accessibility permission to this terminal".into(),
            "On Linux, make sure an X11 session is available".into(),
        ])
    }

    pub fn invalid_log(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidLog, reason)
    }

    pub fn no_such_event(index: usize, len: usize) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("No event at index {} (log has {} events)", index, len),
        )
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Storage, reason)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Storage, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidLog, e.to_string())
    }
}
