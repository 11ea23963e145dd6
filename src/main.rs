use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dirwatch_bridge::config::{CliOverrides, MonitorConfig};
use dirwatch_bridge::production::{ChannelPort, NotifyEngine, WriterPort};
use dirwatch_bridge::traits::MessagePort;
use dirwatch_bridge::{shutdown, LoggingConfig, ShutdownFlag, WatchSession};

/// Stream directory change events as JSON arrays `[action, path, old_path]`
#[derive(Debug, Parser)]
#[command(name = "dirwatch", version)]
struct Cli {
    /// Directory to watch
    dir: Option<String>,

    /// Only watch the top level of DIR
    #[arg(long)]
    no_recursive: bool,

    /// Enable debug diagnostics on stderr
    #[arg(long)]
    debug: bool,

    /// JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write daily-rolling logs into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            watch_dir: self.dir.clone(),
            recursive: self.no_recursive.then_some(false),
            debug: self.debug.then_some(true),
            log_dir: self.log_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    }
    .merge_cli(cli.overrides());

    let _guard = dirwatch_bridge::init_logging(&LoggingConfig {
        debug: config.debug,
        log_dir: config.log_dir.clone(),
    })?;

    let watch_dir = config.watch_dir()?.to_string();
    let running = ShutdownFlag::new();
    let _signals = shutdown::install(running.clone());

    let ports = Arc::new(ChannelPort::new());
    let (port, mut rx) = ports.open();
    let mut session = WatchSession::with_shutdown_flag(
        Arc::new(NotifyEngine::new()),
        ports.clone(),
        running.clone(),
    );
    session.start(&watch_dir, port, config.recursive, config.debug)?;

    let stdout = WriterPort::stdout();
    while running.is_running() {
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Some(message)) => {
                if let Err(e) = stdout.post(port, &message) {
                    tracing::warn!(error = %e, "Failed to write event");
                }
            }
            Ok(None) => {
                tracing::warn!("Event channel closed");
                break;
            }
            // Timeout: re-check the running flag
            Err(_) => {}
        }
    }

    session.stop();
    ports.close(port);
    tracing::info!("dirwatch shutdown complete");
    Ok(())
}
