//! dirwatch-bridge - Forward directory changes to a foreign message port
//!
//! A watch engine reports raw changes on its own thread; each one is resolved
//! to absolute paths, mapped to a stable action code, encoded as a 3-element
//! wire message and posted once to the consumer's port. External
//! collaborators sit behind traits for testability.

pub mod action;
pub mod config;
pub mod debug_log;
pub mod dispatch;
pub mod encoder;
pub mod ffi;
pub mod mocks;
pub mod production;
pub mod session;
pub mod shutdown;
pub mod traits;

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use action::ActionKind;
pub use dispatch::{DispatchError, DispatchSink};
pub use encoder::{ChangeEvent, EncodeError, WireMessage};
pub use session::{SessionState, StartError, WatchSession};
pub use shutdown::ShutdownFlag;

/// Where diagnostics go
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub log_dir: Option<PathBuf>,
}

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("dirwatch_bridge=debug,dirwatch=debug")
        } else {
            EnvFilter::new("dirwatch_bridge=info,dirwatch=info")
        }
    })
}

/// Install the global subscriber: stderr, plus a daily log file when
/// `log_dir` is set.
///
/// Keep the returned guard alive until exit so buffered file output is
/// flushed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = rolling::daily(log_dir, "dirwatch.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(default_filter(config.debug))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Best-effort stderr subscriber for embedders; a no-op when one is already
/// installed.
pub fn try_init_stderr_logging(debug: bool) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(debug))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
