//! Live device backends
//!
//! Built with the `native` feature. Without it the engine still runs against the
//! loopback source and capture sink in [`crate::input`].

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::{NativeSink, NativeSource};

/// Whether this build can touch the real keyboard and pointer
pub fn native_available() -> bool {
    cfg!(feature = "native")
}
