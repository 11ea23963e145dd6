//! Shutdown Signal Handler: advisory running flag
//!
//! Setting the flag only records intent. The control loop that owns the
//! session observes it and calls `stop()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process running flag shared between a signal context and the control loop.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    running: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Single atomic store: no allocation, no logging, no locks.
    #[inline]
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT (or SIGTERM on unix), then clear `flag`.
pub async fn wait_for_signal(flag: ShutdownFlag) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("Received SIGINT (Ctrl+C)");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
    }

    flag.request_stop();
    Ok(())
}

/// Spawn [`wait_for_signal`] on the current tokio runtime.
pub fn install(flag: ShutdownFlag) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal(flag).await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
}
