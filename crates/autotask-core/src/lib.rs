//! autotask-core - Event model for desktop input automation
//!
//! Typed input events, normalized key identifiers, the blocked-key filter and the
//! structured error type shared by the recorder, the player and the store.
//! Nothing here touches a live device.

pub mod error;
pub mod events;
pub mod filter;
pub mod keys;

pub use error::{Error, ErrorCode, Result};
pub use events::{Event, EventLog, LogStats, MouseButton};
pub use keys::{Composite, ControlCode, Key, Modifier, NamedKey, ParseKeyError};

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::{Event, EventLog, LogStats, MouseButton};
    pub use crate::filter::{is_blocked, is_blocked_key, sanitize};
    pub use crate::keys::{Composite, ControlCode, Key, Modifier, NamedKey};
}
