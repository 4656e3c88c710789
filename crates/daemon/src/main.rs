//! ReconBridge Daemon - Main Entry Point
//! Events in as JSON lines on stdin, emitted events out as JSON lines on stdout

mod bus;
mod output;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reconbridge_core::application::{build_adapters, Dispatcher};
use reconbridge_core::port::ProcessRunner;
use reconbridge_infra_system::settings::CONFIG_PATH_ENV;
use reconbridge_infra_system::{Settings, SubprocessRunner};

use crate::bus::{read_events, run_bus};
use crate::output::JsonLinesListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging() -> Result<()> {
    let log_format =
        std::env::var("RECONBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("reconbridge=info"))
        .map_err(|e| anyhow!("Failed to create env filter: {}", e))?;

    // stdout carries results, logs go to stderr
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("ReconBridge daemon v{} starting...", VERSION);

    // 2. Load configuration
    let config_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())
        .map_err(|e| anyhow!("Settings load failed: {}", e))?;

    // 3. Setup dependencies (DI wiring)
    let mut runner = SubprocessRunner::new();
    if let Some(allowlist) = settings.env_allowlist.clone() {
        info!(allowlist = ?allowlist, "Restricting tool environment");
        runner = runner.with_env_allowlist(allowlist);
    }
    let runner: Arc<dyn ProcessRunner> = Arc::new(runner);

    let adapters = build_adapters(&settings.modules, &settings.tool_options, runner)
        .map_err(|e| anyhow!("Adapter setup failed: {}", e))?;
    for adapter in &adapters {
        info!(
            module = %adapter.module_name(),
            executable = ?adapter.executable(),
            "Adapter loaded"
        );
    }

    let dispatcher = Arc::new(Dispatcher::new(
        adapters,
        Arc::new(JsonLinesListener::stdout()),
    ));

    // 4. Start the input reader
    // Never joined, so an open stdin cannot hold up exit
    let (tx, rx) = mpsc::unbounded_channel();
    let reader_tx = tx.clone();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_events(std::io::stdin().lock(), reader_tx))
        .map_err(|e| anyhow!("Failed to start input reader: {}", e))?;

    info!("System ready. Reading events from stdin");

    // 5. Run until input is drained or Ctrl+C
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let stats = run_bus(dispatcher, rx, tx, shutdown).await;

    info!(
        received = stats.received,
        fed_back = stats.fed_back,
        emitted = stats.emitted,
        skipped = stats.skipped,
        failed = stats.failed,
        "Shutdown complete."
    );

    Ok(())
}
