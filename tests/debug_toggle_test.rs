//! Debug logger toggle driven by `start`.
//!
//! Lives in its own test binary: the toggle is process-wide, and the library's
//! unit tests expect it off.

use std::io::Write;
use std::sync::{Arc, Mutex};

use dirwatch_bridge::debug_log;
use dirwatch_bridge::mocks::{ManualWatchEngine, PortBehavior, RecordingPort};
use dirwatch_bridge::traits::{NativeAction, PortId};
use dirwatch_bridge::WatchSession;

static TOGGLE_LOCK: Mutex<()> = Mutex::new(());

/// Collects formatted log output in memory
#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_subscriber(writer: CaptureWriter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish()
}

#[test]
fn test_start_with_debug_enables_send_failure_diagnostics() {
    let _guard = TOGGLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let output = CaptureWriter::default();

    tracing::subscriber::with_default(capture_subscriber(output.clone()), || {
        let engine = Arc::new(ManualWatchEngine::new());
        let port = Arc::new(RecordingPort::with_behavior(PortBehavior::AlwaysReject));
        let mut session = WatchSession::new(engine.clone(), port.clone());

        session.start("/w", PortId(9), true, true).unwrap();
        assert!(debug_log::is_enabled());
        assert_eq!(session.is_debug(), Some(true));

        engine.emit(NativeAction::MODIFY, "loud.txt", None);
        assert_eq!(port.attempt_count(), 1);
        let logged = output.contents();
        assert!(logged.contains("Failed to send message to port"), "{logged}");
        assert!(logged.contains("/w/loud.txt"), "{logged}");

        session.stop();
        let before = output.contents().matches("Failed to send").count();

        session.start("/w", PortId(9), true, false).unwrap();
        assert!(!debug_log::is_enabled());

        engine.emit(NativeAction::MODIFY, "quiet.txt", None);
        assert_eq!(port.attempt_count(), 2);
        let logged = output.contents();
        assert_eq!(logged.matches("Failed to send").count(), before);
        assert!(!logged.contains("quiet.txt"), "{logged}");

        session.stop();
    });
}

#[test]
fn test_rejected_start_keeps_previous_debug_setting() {
    let _guard = TOGGLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let engine = Arc::new(ManualWatchEngine::new());
    let mut session = WatchSession::new(engine, Arc::new(RecordingPort::new()));

    session.start("/w", PortId(1), true, false).unwrap();
    session.stop();
    assert!(!debug_log::is_enabled());

    // Port 0 fails validation before the toggle is touched
    assert!(session.start("/w", PortId(0), true, true).is_err());
    assert!(!debug_log::is_enabled());
}
