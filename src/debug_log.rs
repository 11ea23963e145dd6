//! Debug Logger: diagnostic output gated by a process-wide toggle
//!
//! The toggle is set once when a session starts. While it is off,
//! [`debug_log!`](crate::debug_log!) costs a single relaxed load and formats
//! nothing.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn is_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Emit a `tracing::debug!` event under target `dirwatch_bridge::debug` when
/// debug output is on.
///
/// Accepts the same field and message syntax as `tracing::debug!`.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)+) => {
        if $crate::debug_log::is_enabled() {
            ::tracing::debug!(target: "dirwatch_bridge::debug", $($arg)+);
        }
    };
}
