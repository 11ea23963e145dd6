//! Directory watch engine trait

use std::fmt;
use thiserror::Error;

use super::WatchCallback;

#[derive(Debug, Clone, Error)]
pub enum WatchEngineError {
    #[error("Path not found: {0}")]
    PathNotFound(String),
    #[error("Watch engine not initialized")]
    NotInitialized,
    #[error("Watch error: {0}")]
    WatchError(String),
}

/// Handle returned by a successful registration. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u32);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Raw action value as reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeAction(pub u32);

impl NativeAction {
    pub const CREATE: NativeAction = NativeAction(1);
    pub const DELETE: NativeAction = NativeAction(2);
    pub const MODIFY: NativeAction = NativeAction(3);
    pub const MOVE: NativeAction = NativeAction(4);
}

/// One change as reported by the engine, borrowed from the callback frame.
///
/// `root_dir` ends with a path separator and `path`/`old_path` are relative to
/// it. `None` stands for a null parameter from a foreign engine.
#[derive(Debug, Clone, Copy)]
pub struct RawEvent<'a> {
    pub action: NativeAction,
    pub root_dir: Option<&'a str>,
    pub path: Option<&'a str>,
    pub old_path: Option<&'a str>,
}

/// Trait for directory watching
///
/// Production: `notify` crate
/// Testing: Manual event emission
#[cfg_attr(test, mockall::automock)]
pub trait WatchEngine: Send + Sync {
    /// Process-wide engine setup
    fn init(&self);

    /// Process-wide engine teardown; drops every remaining registration
    fn deinit(&self);

    /// Register `root` and start delivering events to `callback`
    fn watch(
        &self,
        root: &str,
        recursive: bool,
        callback: WatchCallback,
    ) -> Result<WatchId, WatchEngineError>;

    /// Remove a registration. No callback fires for it once this returns.
    fn unwatch(&self, id: WatchId);
}
