//! `notify`-backed watch engine
//!
//! Reports every change as `root_dir` (with trailing separator) plus a path
//! relative to it. notify's callback only queues events; a worker thread per
//! registration pairs rename halves and invokes the watch callback.

use std::collections::HashMap;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::traits::{NativeAction, RawEvent, WatchCallback, WatchEngine, WatchEngineError, WatchId};

/// How long a rename `From` waits for its `To` before it counts as a delete.
const RENAME_TIMEOUT: Duration = Duration::from_millis(250);

/// Worker wake-up interval for expiring renames and noticing shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One translated change: action, relative path, relative old path.
type Translated = (NativeAction, String, Option<String>);

/// A registration: the notify watcher plus the worker that drains it.
struct ActiveWatch {
    watcher: Option<RecommendedWatcher>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        // Dropping the watcher closes the queue; joining makes unwatch quiescent.
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!("Watch worker panicked");
            }
        }
    }
}

pub struct NotifyEngine {
    initialized: AtomicBool,
    next_id: AtomicU32,
    watchers: Mutex<HashMap<WatchId, ActiveWatch>>,
}

impl NotifyEngine {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            next_id: AtomicU32::new(1),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn watchers(&self) -> MutexGuard<'_, HashMap<WatchId, ActiveWatch>> {
        self.watchers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NotifyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchEngine for NotifyEngine {
    fn init(&self) {
        self.initialized.store(true, Ordering::Release);
        tracing::debug!("Watch engine initialized");
    }

    fn deinit(&self) {
        self.initialized.store(false, Ordering::Release);
        // Join workers outside the lock.
        let drained: Vec<ActiveWatch> = self.watchers().drain().map(|(_, w)| w).collect();
        tracing::debug!(dropped = drained.len(), "Watch engine deinitialized");
        drop(drained);
    }

    fn watch(
        &self,
        root: &str,
        recursive: bool,
        callback: WatchCallback,
    ) -> Result<WatchId, WatchEngineError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(WatchEngineError::NotInitialized);
        }

        let root_path = PathBuf::from(root);
        if !root_path.exists() {
            return Err(WatchEngineError::PathNotFound(root.to_string()));
        }
        // Some backends (FSEvents) report canonical paths.
        let canonical_root = root_path.canonicalize().ok();
        let root_dir = with_trailing_separator(root);

        let (tx, rx) = mpsc::channel::<Event>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    tracing::trace!("File event: {:?}", event);
                    if tx.send(event).is_err() {
                        tracing::debug!("Watch worker gone, dropping event");
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                }
            }
        })
        .map_err(|e| WatchEngineError::WatchError(e.to_string()))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&root_path, mode)
            .map_err(|e| WatchEngineError::WatchError(e.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let mut translator = Translator::new(root_path, canonical_root);
        let worker = std::thread::Builder::new()
            .name("dirwatch-events".into())
            .spawn(move || {
                let emit = |changes: Vec<Translated>| {
                    for (action, path, old_path) in changes {
                        if worker_stop.load(Ordering::Acquire) {
                            return;
                        }
                        callback(RawEvent {
                            action,
                            root_dir: Some(root_dir.as_str()),
                            path: Some(path.as_str()),
                            old_path: old_path.as_deref(),
                        });
                    }
                };

                while !worker_stop.load(Ordering::Acquire) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(event) => emit(translator.on_event(&event, Instant::now())),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    emit(translator.on_idle(Instant::now()));
                }
            })
            .map_err(|e| WatchEngineError::WatchError(e.to_string()))?;

        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.watchers().insert(
            id,
            ActiveWatch {
                watcher: Some(watcher),
                stop,
                worker: Some(worker),
            },
        );
        tracing::info!(path = %root, recursive, "Watching path");

        Ok(id)
    }

    fn unwatch(&self, id: WatchId) {
        let removed = self.watchers().remove(&id);
        match removed {
            Some(active) => {
                drop(active);
                tracing::info!(handle = %id, "Unwatched path");
            }
            None => tracing::debug!(handle = %id, "Unwatch for unknown handle"),
        }
    }
}

fn with_trailing_separator(root: &str) -> String {
    let mut dir = root.to_string();
    if !dir.ends_with('/') && !dir.ends_with(MAIN_SEPARATOR) {
        dir.push(MAIN_SEPARATOR);
    }
    dir
}

fn relative(path: &Path, root: &Path, canonical_root: Option<&Path>) -> Option<String> {
    let rel = path
        .strip_prefix(root)
        .ok()
        .or_else(|| canonical_root.and_then(|c| path.strip_prefix(c).ok()))?;
    Some(rel.to_string_lossy().into_owned())
}

/// A rename `From` still waiting for its `To`.
#[derive(Debug)]
struct PendingFrom {
    tracker: Option<usize>,
    path: Option<String>,
    since: Instant,
}

/// Turns notify events into engine-level changes, pairing rename halves.
///
/// inotify reports a rename inside the root as `From`, `To`, then `Both`
/// sharing one tracker. A file moved in yields a lone `To` (a create); a file
/// moved out yields a lone `From`, which becomes a delete once an unrelated
/// event arrives or [`RENAME_TIMEOUT`] passes.
struct Translator {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    pending: Option<PendingFrom>,
    // Tracker of a rename already reported from its `To`; its `Both` is skipped.
    completed: Option<Option<usize>>,
}

impl Translator {
    fn new(root: PathBuf, canonical_root: Option<PathBuf>) -> Self {
        Self {
            root,
            canonical_root,
            pending: None,
            completed: None,
        }
    }

    fn rel(&self, path: &Path) -> Option<String> {
        relative(path, &self.root, self.canonical_root.as_deref())
    }

    fn each(&self, event: &Event, action: NativeAction) -> Vec<Translated> {
        event
            .paths
            .iter()
            .filter_map(|p| self.rel(p))
            .map(|p| (action, p, None))
            .collect()
    }

    /// Report an unmatched `From` as a delete.
    fn flush_pending(&mut self) -> Vec<Translated> {
        match self.pending.take() {
            Some(PendingFrom {
                path: Some(path), ..
            }) => vec![(NativeAction::DELETE, path, None)],
            _ => Vec::new(),
        }
    }

    fn on_idle(&mut self, now: Instant) -> Vec<Translated> {
        match &self.pending {
            Some(pending) if now.duration_since(pending.since) >= RENAME_TIMEOUT => {
                self.flush_pending()
            }
            _ => Vec::new(),
        }
    }

    fn on_event(&mut self, event: &Event, now: Instant) -> Vec<Translated> {
        let tracker = event.attrs.tracker();

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                let out = self.flush_pending();
                self.pending = Some(PendingFrom {
                    tracker,
                    path: event.paths.first().and_then(|p| self.rel(p)),
                    since: now,
                });
                self.completed = None;
                out
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let new = event.paths.first().and_then(|p| self.rel(p));
                let paired = self
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.tracker == tracker);

                if paired {
                    let old = self.pending.take().and_then(|pending| pending.path);
                    self.completed = Some(tracker);
                    return rename(old, new);
                }

                // Moved in from outside the root
                let mut out = self.flush_pending();
                out.extend(new.map(|new| (NativeAction::CREATE, new, None)));
                out
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if self.completed.take() == Some(tracker) {
                    return Vec::new();
                }
                if self
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.tracker == tracker)
                {
                    self.pending = None;
                }
                let mut out = self.flush_pending();
                let mut paths = event.paths.iter();
                let old = paths.next().and_then(|p| self.rel(p));
                let new = paths.next().and_then(|p| self.rel(p));
                out.extend(rename(old, new));
                out
            }
            _ => {
                let mut out = self.flush_pending();
                self.completed = None;
                out.extend(self.translate_plain(event));
                out
            }
        }
    }

    fn translate_plain(&self, event: &Event) -> Vec<Translated> {
        match event.kind {
            EventKind::Create(_) => self.each(event, NativeAction::CREATE),
            EventKind::Remove(_) => self.each(event, NativeAction::DELETE),
            EventKind::Modify(ModifyKind::Name(_)) => self.each(event, NativeAction::MOVE),
            EventKind::Modify(_) => self.each(event, NativeAction::MODIFY),
            EventKind::Access(_) => Vec::new(),
            EventKind::Any | EventKind::Other => self.each(event, NativeAction(0)),
        }
    }
}

/// Old/new pair to a change; a side outside the root degrades to create/delete.
fn rename(old: Option<String>, new: Option<String>) -> Vec<Translated> {
    match (old, new) {
        (Some(old), Some(new)) => vec![(NativeAction::MOVE, new, Some(old))],
        (None, Some(new)) => vec![(NativeAction::CREATE, new, None)],
        (Some(old), None) => vec![(NativeAction::DELETE, old, None)],
        (None, None) => Vec::new(),
    }
}
