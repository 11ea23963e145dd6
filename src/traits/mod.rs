//! Trait definitions for dependency injection
//!
//! The watch engine and the foreign message port are external collaborators;
//! both are abstracted behind traits so the bridge can be tested without a
//! real filesystem or consumer.

use std::sync::Arc;

mod message_port;
mod watch_engine;

pub use message_port::{MessagePort, PortError, PortId};
pub use watch_engine::{NativeAction, RawEvent, WatchEngine, WatchEngineError, WatchId};

#[cfg(test)]
pub use message_port::MockMessagePort;
#[cfg(test)]
pub use watch_engine::MockWatchEngine;

/// Callback invoked by a watch engine for every detected change.
///
/// Runs on the engine's own thread, never on the controlling thread.
pub type WatchCallback = Arc<dyn Fn(RawEvent<'_>) + Send + Sync>;
