//! Watch Session: lifecycle of the single active directory watch
//!
//! `Stopped -> Running -> Stopped`. Lifecycle calls come from one controlling
//! thread; the engine's thread only produces events through the callback.

use std::sync::Arc;
use thiserror::Error;

use crate::debug_log;
use crate::dispatch::DispatchSink;
use crate::shutdown::ShutdownFlag;
use crate::traits::{
    MessagePort, PortId, RawEvent, WatchCallback, WatchEngine, WatchEngineError, WatchId,
};

/// Longest accepted watch root (exclusive), in bytes.
#[cfg(windows)]
pub const MAX_PATH_LEN: usize = 260;
#[cfg(target_os = "macos")]
pub const MAX_PATH_LEN: usize = 1024;
#[cfg(not(any(windows, target_os = "macos")))]
pub const MAX_PATH_LEN: usize = 4096;

#[derive(Debug, Clone, Error)]
pub enum StartError {
    #[error("Invalid directory: path is empty")]
    InvalidPath,
    #[error("Invalid port: port id must be non-zero")]
    InvalidPort,
    #[error("Directory path too long: {len} bytes (limit {max})")]
    PathTooLong { len: usize, max: usize },
    #[error("A watch session is already running")]
    AlreadyRunning,
    #[error("Failed to monitor directory: {0}")]
    EngineFailure(#[from] WatchEngineError),
}

impl StartError {
    /// Collapsed status for callers that only understand `0`/non-zero.
    pub fn status(&self) -> i32 {
        1
    }
}

/// `0` on success, `1` on any start failure.
pub fn status_code(result: &Result<(), StartError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// Configuration and engine handle of a running watch.
#[derive(Debug)]
struct ActiveWatch {
    root_path: String,
    recursive: bool,
    debug: bool,
    port: PortId,
    handle: WatchId,
}

/// Owns one watch registration at a time.
///
/// The engine handle exists exactly while the session is `Running`.
pub struct WatchSession {
    engine: Arc<dyn WatchEngine>,
    transport: Arc<dyn MessagePort>,
    running: ShutdownFlag,
    active: Option<ActiveWatch>,
}

impl WatchSession {
    pub fn new(engine: Arc<dyn WatchEngine>, transport: Arc<dyn MessagePort>) -> Self {
        Self::with_shutdown_flag(engine, transport, ShutdownFlag::new())
    }

    /// Share `running` with a signal handler; `stop()` clears it as well.
    ///
    /// `start` never re-arms the flag, so a signal that lands mid-start is
    /// kept. Use a fresh flag for each run.
    pub fn with_shutdown_flag(
        engine: Arc<dyn WatchEngine>,
        transport: Arc<dyn MessagePort>,
        running: ShutdownFlag,
    ) -> Self {
        Self {
            engine,
            transport,
            running,
            active: None,
        }
    }

    /// Validate parameters, then register `root_path` with the engine.
    ///
    /// Validation failures touch no engine state. A failed registration
    /// deinitializes the engine again and leaves the session `Stopped`.
    pub fn start(
        &mut self,
        root_path: &str,
        port: PortId,
        recursive: bool,
        debug: bool,
    ) -> Result<(), StartError> {
        if self.active.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        if root_path.is_empty() {
            return Err(StartError::InvalidPath);
        }
        if !port.is_valid() {
            return Err(StartError::InvalidPort);
        }
        if root_path.len() >= MAX_PATH_LEN {
            return Err(StartError::PathTooLong {
                len: root_path.len(),
                max: MAX_PATH_LEN,
            });
        }

        debug_log::set_enabled(debug);
        self.engine.init();

        let sink = DispatchSink::new(port, Arc::clone(&self.transport));
        let callback: WatchCallback = Arc::new(move |raw: RawEvent<'_>| {
            // Failures were already reported by the sink; the watch keeps going.
            let _ = sink.forward(&raw);
        });

        let handle = match self.engine.watch(root_path, recursive, callback) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(dir = %root_path, error = %e, "Failed to monitor directory");
                self.engine.deinit();
                return Err(StartError::EngineFailure(e));
            }
        };

        self.active = Some(ActiveWatch {
            root_path: root_path.to_string(),
            recursive,
            debug,
            port,
            handle,
        });

        tracing::info!(
            dir = %root_path,
            port = %port,
            recursive,
            handle = %handle,
            "Started monitoring"
        );
        Ok(())
    }

    /// Unregister the watch and release the engine. No-op when `Stopped`.
    pub fn stop(&mut self) {
        self.running.request_stop();

        let Some(active) = self.active.take() else {
            debug_log!("Stop requested while already stopped");
            return;
        };

        self.engine.unwatch(active.handle);
        self.engine.deinit();
        tracing::info!(dir = %active.root_path, "Stopped monitoring {}", active.root_path);
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Running
        } else {
            SessionState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn root_path(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.root_path.as_str())
    }

    pub fn port(&self) -> Option<PortId> {
        self.active.as_ref().map(|a| a.port)
    }

    pub fn is_recursive(&self) -> Option<bool> {
        self.active.as_ref().map(|a| a.recursive)
    }

    pub fn is_debug(&self) -> Option<bool> {
        self.active.as_ref().map(|a| a.debug)
    }

    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.running.clone()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::WireMessage;
    use crate::mocks::{ManualWatchEngine, PortBehavior, RecordingPort};
    use crate::traits::{MockWatchEngine, NativeAction};

    // Every session here starts with debug=false: the debug toggle is
    // process-wide and debug_log's own test expects it off.

    fn test_session() -> (WatchSession, Arc<ManualWatchEngine>, Arc<RecordingPort>) {
        let engine = Arc::new(ManualWatchEngine::new());
        let port = Arc::new(RecordingPort::new());
        let session = WatchSession::new(engine.clone(), port.clone());
        (session, engine, port)
    }

    fn untouched_engine() -> MockWatchEngine {
        let mut engine = MockWatchEngine::new();
        engine.expect_init().never();
        engine.expect_watch().never();
        engine.expect_deinit().never();
        engine
    }

    #[test]
    fn test_start_and_stop() {
        let (mut session, engine, _port) = test_session();

        session.start("/tmp/watchdir", PortId(42), true, false).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.root_path(), Some("/tmp/watchdir"));
        assert_eq!(session.port(), Some(PortId(42)));
        assert_eq!(session.is_recursive(), Some(true));
        assert!(engine.is_watching("/tmp/watchdir"));

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!engine.is_watching("/tmp/watchdir"));
        assert_eq!(engine.init_count(), 1);
        assert_eq!(engine.deinit_count(), 1);
        assert_eq!(engine.unwatch_count(), 1);
    }

    #[test]
    fn test_empty_path_rejected_before_engine() {
        let mut session = WatchSession::new(
            Arc::new(untouched_engine()),
            Arc::new(RecordingPort::new()),
        );

        let result = session.start("", PortId(42), true, false);
        assert!(matches!(result, Err(StartError::InvalidPath)));
        assert_eq!(status_code(&result), 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_zero_port_rejected_before_engine() {
        let mut session = WatchSession::new(
            Arc::new(untouched_engine()),
            Arc::new(RecordingPort::new()),
        );

        let result = session.start("/tmp/watchdir", PortId(0), true, false);
        assert!(matches!(result, Err(StartError::InvalidPort)));
    }

    #[test]
    fn test_path_length_limit() {
        let (mut session, engine, _port) = test_session();

        let at_limit = "a".repeat(MAX_PATH_LEN);
        match session.start(&at_limit, PortId(1), false, false) {
            Err(StartError::PathTooLong { len, max }) => {
                assert_eq!(len, MAX_PATH_LEN);
                assert_eq!(max, MAX_PATH_LEN);
            }
            other => panic!("Expected PathTooLong, got {:?}", other),
        }
        assert_eq!(engine.init_count(), 0);

        let below_limit = "a".repeat(MAX_PATH_LEN - 1);
        session.start(&below_limit, PortId(1), false, false).unwrap();
        assert_eq!(engine.init_count(), 1);
    }

    #[test]
    fn test_engine_failure_rolls_back() {
        let (mut session, engine, _port) = test_session();
        engine.fail_next_watch(WatchEngineError::PathNotFound("/missing".into()));

        let result = session.start("/missing", PortId(42), true, false);

        assert!(matches!(
            result,
            Err(StartError::EngineFailure(WatchEngineError::PathNotFound(_)))
        ));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(engine.init_count(), 1);
        assert_eq!(engine.deinit_count(), 1);
        assert!(engine.watched_roots().is_empty());
    }

    #[test]
    fn test_second_start_rejected_while_running() {
        let (mut session, engine, _port) = test_session();
        session.start("/a", PortId(1), true, false).unwrap();

        let result = session.start("/b", PortId(1), true, false);

        assert!(matches!(result, Err(StartError::AlreadyRunning)));
        assert_eq!(session.root_path(), Some("/a"));
        assert_eq!(engine.init_count(), 1);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let (mut session, engine, _port) = test_session();
        session.start("/a", PortId(1), true, false).unwrap();

        session.stop();
        session.stop();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(engine.unwatch_count(), 1);
        assert_eq!(engine.deinit_count(), 1);
    }

    #[test]
    fn test_stop_on_fresh_session_is_noop() {
        let mut session = WatchSession::new(
            Arc::new(untouched_engine()),
            Arc::new(RecordingPort::new()),
        );
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_clears_shutdown_flag_and_restart_keeps_it_clear() {
        let (mut session, _engine, _port) = test_session();
        let flag = session.shutdown_flag();

        session.start("/a", PortId(1), true, false).unwrap();
        assert!(flag.is_running());

        session.stop();
        assert!(!flag.is_running());

        session.start("/a", PortId(1), true, false).unwrap();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_signal_during_start_is_not_lost() {
        let engine = Arc::new(ManualWatchEngine::new());
        let flag = ShutdownFlag::new();
        let mut session = WatchSession::with_shutdown_flag(
            engine,
            Arc::new(RecordingPort::new()),
            flag.clone(),
        );

        flag.request_stop();
        session.start("/a", PortId(1), true, false).unwrap();

        assert_eq!(session.state(), SessionState::Running);
        assert!(!flag.is_running());
    }

    #[test]
    fn test_events_flow_to_port() {
        let (mut session, engine, port) = test_session();
        session.start("/tmp/watchdir", PortId(42), true, false).unwrap();

        engine.emit(NativeAction::CREATE, "a.txt", None);
        engine.emit(NativeAction::MOVE, "b.txt", Some("a.txt"));

        let messages = port.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|(id, _)| *id == PortId(42)));
        assert_eq!(
            messages[0].1,
            WireMessage {
                action_code: 0,
                path: "/tmp/watchdir/a.txt".into(),
                old_path: None,
            }
        );
        assert_eq!(
            messages[1].1,
            WireMessage {
                action_code: 3,
                path: "/tmp/watchdir/b.txt".into(),
                old_path: Some("/tmp/watchdir/a.txt".into()),
            }
        );
    }

    #[test]
    fn test_delivery_failure_keeps_session_running() {
        let engine = Arc::new(ManualWatchEngine::new());
        let port = Arc::new(RecordingPort::with_behavior(PortBehavior::RejectThenAccept(1)));
        let mut session = WatchSession::new(engine.clone(), port.clone());
        session.start("/w", PortId(5), true, false).unwrap();

        engine.emit(NativeAction::MODIFY, "first", None);
        engine.emit(NativeAction::MODIFY, "second", None);

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(port.attempt_count(), 2);
        let delivered = port.messages();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1.path, "/w/second");
    }

    #[test]
    fn test_no_events_after_stop() {
        let (mut session, engine, port) = test_session();
        session.start("/w", PortId(5), true, false).unwrap();
        session.stop();

        engine.emit(NativeAction::CREATE, "late", None);

        assert_eq!(port.attempt_count(), 0);
    }

    #[test]
    fn test_drop_stops_running_session() {
        let (mut session, engine, _port) = test_session();
        session.start("/w", PortId(5), true, false).unwrap();

        drop(session);

        assert_eq!(engine.unwatch_count(), 1);
        assert_eq!(engine.deinit_count(), 1);
    }
}
