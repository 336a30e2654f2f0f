//! dwatch - debounced directory watcher

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use watcher::{WatchConfig, WatcherBuilder};

mod output;

/// Watch a directory and print debounced file system events
#[derive(Parser)]
#[command(name = "dwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to watch (overrides the config file)
    path: Option<PathBuf>,

    /// Backend: "native" for file system events, "reload" to run the reload command
    #[arg(short, long)]
    backend: Option<String>,

    /// Command run in the watched directory by the reload backend
    #[arg(long)]
    reload_command: Option<String>,

    /// Debounce window in milliseconds (default: 1000)
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one JSON object per event
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Config file values, overridden by flags
    fn resolve_config(&self) -> Result<WatchConfig> {
        let mut config = match &self.config {
            Some(file) => WatchConfig::load(file)?,
            None => WatchConfig::default(),
        };

        if let Some(path) = &self.path {
            config.path = path.clone();
        }
        if config.path.as_os_str().is_empty() {
            config.path = std::env::current_dir().context("Failed to get current directory")?;
        }
        if let Some(backend) = &self.backend {
            config.backend = backend.clone();
        }
        if let Some(command) = &self.reload_command {
            config.reload_command = command.clone();
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, events to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let printer = output::Printer::new(cli.json);

    let watcher = Arc::new(
        WatcherBuilder::from_config(&config)
            .on_any(move |_, event| printer.print(event))
            .build()?,
    );

    // the reload backend blocks until its command exits
    let starter = Arc::clone(&watcher);
    tokio::task::spawn_blocking(move || starter.start())
        .await
        .context("Start task panicked")?
        .with_context(|| format!("Failed to watch {}", config.path.display()))?;

    if !watcher.is_watching() {
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    watcher.stop()?;

    let stats = watcher.session().stats();
    tracing::info!(
        forwarded = stats.forwarded,
        suppressed = stats.suppressed,
        failed = stats.failed,
        "session ended"
    );
    Ok(())
}
