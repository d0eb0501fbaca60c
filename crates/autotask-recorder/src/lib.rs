//! autotask-recorder - Record and replay desktop input
//!
//! Captures timestamped pointer and keyboard input, stores it by name and replays it
//! with a speed multiplier, repeats, pause/resume and prompt cancellation.
//!
//! ## Backends
//!
//! - **native** feature: global capture and injection via rdev (X11, macOS, Windows)
//! - always available: [`LoopbackSource`] and [`CaptureSink`] for scripted drivers and tests

pub mod config;
pub mod control;
pub mod input;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod storage;

pub use config::{load_config, save_config, Config};
pub use control::{Cancelled, PlaybackControl};
pub use input::{CaptureSink, Captured, InputSink, InputSource, LoopbackSource, RawInput, SinkOp};
pub use recorder::{Recorder, RecorderConfig, RecorderState};
pub use replay::{
    LoadReport, PlaybackHandle, PlaybackOutcome, PlaybackReport, PlaybackStatus, Player,
    PlayerConfig, PlayerState,
};
pub use storage::{AutomationStorage, AutomationStore, AutomationSummary, AutomationUpdate};

pub mod prelude {
    pub use autotask_core::prelude::*;

    pub use crate::input::{CaptureSink, InputSink, InputSource, LoopbackSource};
    pub use crate::recorder::{Recorder, RecorderConfig};
    pub use crate::replay::{PlaybackOutcome, PlaybackReport, Player, PlayerConfig};
    pub use crate::storage::{AutomationStorage, AutomationStore};

    #[cfg(feature = "native")]
    pub use crate::platform::{NativeSink, NativeSource};
}
