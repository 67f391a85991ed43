//! Kiosk display station — entry point.
//!
//! ```text
//! kiosk-display                    Listen with defaults
//! kiosk-display --config <path>    Use custom config TOML
//! kiosk-display --gen-config       Dump default config and exit
//! ```

mod presenter;

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kiosk_core::{KioskConfig, PlaybackController, SessionManager};

use crate::presenter::LoggingPresenter;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kiosk-display", about = "Kiosk video display station")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "kiosk-display.toml")]
    config: PathBuf,

    /// Bind address (overrides config). Example: 0.0.0.0
    #[arg(short, long)]
    bind: Option<String>,

    /// Listen port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&KioskConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = KioskConfig::load(&cli.config);
    if let Some(bind) = cli.bind {
        config.network.address = bind;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("kiosk-display v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Playback controller on its own serialized task ───────

    let (out_tx, out_rx) = mpsc::channel(64);
    let (controller, handle) = PlaybackController::new(config.inactivity_timeout(), out_tx);
    let presenter = LoggingPresenter::new(
        PathBuf::from(&config.playback.assets_dir),
        handle.ready_notifier(),
    );
    let controller_task = tokio::spawn(controller.run(Box::new(presenter)));

    // ── 2. Session manager: accept loop + command dispatch ──────

    let bind_addr = format!("{}:{}", config.network.address, config.network.port);
    // Bind failure is a startup error, not retried.
    let session = SessionManager::start(&bind_addr, handle.clone(), out_rx).await?;

    // ── 3. Run until terminated ─────────────────────────────────

    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    session.shutdown().await;
    drop(handle);
    let _ = controller_task.await;

    Ok(())
}
