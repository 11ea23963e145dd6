//! C ABI for embedding runtimes
//!
//! A foreign runtime registers one post callback, then drives a single
//! process-global session through `dirwatch_start` / `dirwatch_stop`. Strings
//! handed to the callback are only valid for the duration of the call.

use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::encoder::WireMessage;
use crate::production::NotifyEngine;
use crate::session::{status_code, StartError, WatchSession};
use crate::traits::{MessagePort, PortError, PortId};

/// Receives one message: `(port, action_code, path, old_path_or_null)`.
/// Returns `false` when the consumer could not accept it.
pub type PostCallback = extern "C" fn(
    port: i64,
    action: i32,
    path: *const c_char,
    old_path: *const c_char,
) -> bool;

static POST_CALLBACK: Mutex<Option<PostCallback>> = Mutex::new(None);
static SESSION: Mutex<Option<WatchSession>> = Mutex::new(None);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Port transport that forwards through a registered C callback.
pub struct CallbackPort {
    callback: PostCallback,
}

impl CallbackPort {
    pub fn new(callback: PostCallback) -> Self {
        Self { callback }
    }
}

impl MessagePort for CallbackPort {
    fn post(&self, port: PortId, message: &WireMessage) -> Result<(), PortError> {
        let path = CString::new(message.path.as_str())
            .map_err(|e| PortError::Rejected(e.to_string()))?;
        let old_path = message
            .old_path
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|e| PortError::Rejected(e.to_string()))?;

        let accepted = (self.callback)(
            port.0,
            message.action_code,
            path.as_ptr(),
            old_path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
        );

        if accepted {
            Ok(())
        } else {
            Err(PortError::Rejected(format!("{} refused message", port)))
        }
    }
}

/// Register the transport used by subsequent sessions. Pass `None` to clear.
#[no_mangle]
pub extern "C" fn dirwatch_set_post_callback(callback: Option<PostCallback>) {
    *lock(&POST_CALLBACK) = callback;
}

/// Start watching `watch_dir`. Returns `0` on success, `1` on any failure.
///
/// # Safety
///
/// `watch_dir` must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn dirwatch_start(
    watch_dir: *const c_char,
    port: i64,
    recursive: i32,
    debug: bool,
) -> i32 {
    crate::try_init_stderr_logging(debug);

    let dir = if watch_dir.is_null() {
        None
    } else {
        // SAFETY: non-null and NUL-terminated per the caller contract
        unsafe { CStr::from_ptr(watch_dir) }.to_str().ok()
    };
    let Some(dir) = dir else {
        tracing::error!("Invalid directory: null or not UTF-8");
        return StartError::InvalidPath.status();
    };

    let Some(callback) = *lock(&POST_CALLBACK) else {
        tracing::error!("No post callback registered");
        return StartError::InvalidPort.status();
    };

    let mut slot = lock(&SESSION);
    if slot.as_ref().is_some_and(WatchSession::is_running) {
        tracing::error!(dir = %dir, "{}", StartError::AlreadyRunning);
        return StartError::AlreadyRunning.status();
    }

    let session = slot.insert(WatchSession::new(
        Arc::new(NotifyEngine::new()),
        Arc::new(CallbackPort::new(callback)),
    ));
    let result = session.start(dir, PortId(port), recursive != 0, debug);
    if let Err(e) = &result {
        tracing::error!(dir = %dir, error = %e, "Failed to start monitor");
    }
    status_code(&result)
}

/// Stop the running session, if any.
#[no_mangle]
pub extern "C" fn dirwatch_stop() {
    if let Some(mut session) = lock(&SESSION).take() {
        session.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    static TEST_LOCK: Mutex<()> = Mutex::new(());
    static RECEIVED: Mutex<Vec<(i64, i32, String, Option<String>)>> = Mutex::new(Vec::new());

    extern "C" fn record(
        port: i64,
        action: i32,
        path: *const c_char,
        old_path: *const c_char,
    ) -> bool {
        let to_string = |p: *const c_char| {
            unsafe { CStr::from_ptr(p) }
                .to_string_lossy()
                .into_owned()
        };
        let path = to_string(path);
        let old = if old_path.is_null() {
            None
        } else {
            Some(to_string(old_path))
        };
        lock(&RECEIVED).push((port, action, path, old));
        true
    }

    extern "C" fn refuse(_: i64, _: i32, _: *const c_char, _: *const c_char) -> bool {
        false
    }

    #[test]
    fn test_callback_port_passes_null_old_path() {
        let _guard = lock(&TEST_LOCK);
        lock(&RECEIVED).clear();

        let port = CallbackPort::new(record);
        port.post(
            PortId(9),
            &WireMessage {
                action_code: 0,
                path: "/w/a".into(),
                old_path: None,
            },
        )
        .unwrap();

        let received = lock(&RECEIVED).clone();
        assert_eq!(received, vec![(9, 0, "/w/a".to_string(), None)]);
    }

    #[test]
    fn test_callback_port_refusal() {
        let port = CallbackPort::new(refuse);
        let result = port.post(
            PortId(9),
            &WireMessage {
                action_code: 0,
                path: "/w/a".into(),
                old_path: None,
            },
        );
        assert!(matches!(result, Err(PortError::Rejected(_))));
    }

    #[test]
    fn test_start_validation_failures() {
        let _guard = lock(&TEST_LOCK);
        dirwatch_set_post_callback(Some(record));

        let empty = CString::new("").unwrap();
        assert_eq!(unsafe { dirwatch_start(ptr::null(), 42, 1, false) }, 1);
        assert_eq!(unsafe { dirwatch_start(empty.as_ptr(), 42, 1, false) }, 1);
        assert_eq!(unsafe { dirwatch_start(c"/tmp".as_ptr(), 0, 1, false) }, 1);

        dirwatch_set_post_callback(None);
        assert_eq!(unsafe { dirwatch_start(c"/tmp".as_ptr(), 42, 1, false) }, 1);

        // Stop with nothing running is harmless.
        dirwatch_stop();
    }

    #[test]
    fn test_start_stop_delivers_events() {
        let _guard = lock(&TEST_LOCK);
        lock(&RECEIVED).clear();
        dirwatch_set_post_callback(Some(record));

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let root_c = CString::new(root.to_str().unwrap()).unwrap();

        assert_eq!(unsafe { dirwatch_start(root_c.as_ptr(), 42, 1, false) }, 0);
        // A second start while running is refused.
        assert_eq!(unsafe { dirwatch_start(root_c.as_ptr(), 42, 1, false) }, 1);

        std::fs::write(root.join("a.txt"), b"hello").unwrap();

        let expected = root.join("a.txt").to_string_lossy().into_owned();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut found = false;
        while Instant::now() < deadline && !found {
            found = lock(&RECEIVED)
                .iter()
                .any(|(port, action, path, old)| {
                    *port == 42 && *action == 0 && *path == expected && old.is_none()
                });
            std::thread::sleep(Duration::from_millis(20));
        }

        dirwatch_stop();
        dirwatch_set_post_callback(None);
        assert!(found, "no create event for {}", expected);
    }
}
