//! Test doubles for dependency injection
//!
//! In-memory stand-ins for the watch engine and the consumer port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::encoder::WireMessage;
use crate::traits::{
    MessagePort, NativeAction, PortError, PortId, RawEvent, WatchCallback, WatchEngine,
    WatchEngineError, WatchId,
};

// ============================================================================
// ManualWatchEngine
// ============================================================================

struct Registration {
    root_dir: String,
    recursive: bool,
    callback: WatchCallback,
}

/// Manual watch engine for testing
///
/// Does not touch the file system. Tests call [`ManualWatchEngine::emit`] to
/// simulate engine callbacks.
#[derive(Clone, Default)]
pub struct ManualWatchEngine {
    registrations: Arc<Mutex<HashMap<WatchId, Registration>>>,
    next_id: Arc<AtomicU32>,
    fail_next: Arc<Mutex<Option<WatchEngineError>>>,
    init_calls: Arc<AtomicUsize>,
    deinit_calls: Arc<AtomicUsize>,
    watch_calls: Arc<AtomicUsize>,
    unwatch_calls: Arc<AtomicUsize>,
}

impl ManualWatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `watch` call fail with `error`
    pub fn fail_next_watch(&self, error: WatchEngineError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn deinit_count(&self) -> usize {
        self.deinit_calls.load(Ordering::SeqCst)
    }

    pub fn watch_count(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn unwatch_count(&self) -> usize {
        self.unwatch_calls.load(Ordering::SeqCst)
    }

    /// Registered roots as passed to `watch` (without trailing separator)
    pub fn watched_roots(&self) -> Vec<String> {
        self.registrations
            .lock()
            .unwrap()
            .values()
            .map(|r| r.root_dir.trim_end_matches('/').to_string())
            .collect()
    }

    pub fn is_watching(&self, root: &str) -> bool {
        self.watched_roots().iter().any(|r| r == root)
    }

    pub fn is_recursive(&self, root: &str) -> Option<bool> {
        self.registrations
            .lock()
            .unwrap()
            .values()
            .find(|r| r.root_dir.trim_end_matches('/') == root)
            .map(|r| r.recursive)
    }

    /// Simulate a change relative to every registered root
    pub fn emit(&self, action: NativeAction, path: &str, old_path: Option<&str>) {
        for (root_dir, callback) in self.snapshot() {
            callback(RawEvent {
                action,
                root_dir: Some(root_dir.as_str()),
                path: Some(path),
                old_path,
            });
        }
    }

    /// Deliver a raw event verbatim, null parameters included
    pub fn emit_raw(&self, event: RawEvent<'_>) {
        for (_, callback) in self.snapshot() {
            callback(event);
        }
    }

    // Callbacks run outside the lock, like a real engine thread.
    fn snapshot(&self) -> Vec<(String, WatchCallback)> {
        self.registrations
            .lock()
            .unwrap()
            .values()
            .map(|r| (r.root_dir.clone(), Arc::clone(&r.callback)))
            .collect()
    }
}

impl WatchEngine for ManualWatchEngine {
    fn init(&self) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn deinit(&self) {
        self.deinit_calls.fetch_add(1, Ordering::SeqCst);
        self.registrations.lock().unwrap().clear();
    }

    fn watch(
        &self,
        root: &str,
        recursive: bool,
        callback: WatchCallback,
    ) -> Result<WatchId, WatchEngineError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut root_dir = root.to_string();
        if !root_dir.ends_with('/') {
            root_dir.push('/');
        }
        self.registrations.lock().unwrap().insert(
            id,
            Registration {
                root_dir,
                recursive,
                callback,
            },
        );
        Ok(id)
    }

    fn unwatch(&self, id: WatchId) {
        self.unwatch_calls.fetch_add(1, Ordering::SeqCst);
        self.registrations.lock().unwrap().remove(&id);
    }
}

// ============================================================================
// RecordingPort
// ============================================================================

/// Failure configuration for the recording port
#[derive(Debug, Clone)]
pub enum PortBehavior {
    /// Accept every message
    AlwaysAccept,
    /// Reject every message
    AlwaysReject,
    /// Reject the first N messages, then accept
    RejectThenAccept(usize),
}

/// Recording message port for testing
///
/// Records accepted messages and counts every attempt, accepted or not.
#[derive(Clone)]
pub struct RecordingPort {
    messages: Arc<Mutex<Vec<(PortId, WireMessage)>>>,
    behavior: Arc<Mutex<PortBehavior>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::with_behavior(PortBehavior::AlwaysAccept)
    }

    pub fn with_behavior(behavior: PortBehavior) -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(behavior)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the behavior for subsequent posts
    pub fn set_behavior(&self, behavior: PortBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Accepted messages in delivery order
    pub fn messages(&self) -> Vec<(PortId, WireMessage)> {
        self.messages.lock().unwrap().clone()
    }

    /// Number of `post` calls, including rejected ones
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
        self.attempts.store(0, Ordering::SeqCst);
    }
}

impl Default for RecordingPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePort for RecordingPort {
    fn post(&self, port: PortId, message: &WireMessage) -> Result<(), PortError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let accept = match *self.behavior.lock().unwrap() {
            PortBehavior::AlwaysAccept => true,
            PortBehavior::AlwaysReject => false,
            PortBehavior::RejectThenAccept(n) => attempt > n,
        };
        if !accept {
            return Err(PortError::Rejected(format!("attempt {} refused", attempt)));
        }

        self.messages.lock().unwrap().push((port, message.clone()));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
