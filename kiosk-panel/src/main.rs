//! Kiosk control panel — entry point.
//!
//! Headless stand-in for the touch UI: drives the connection manager
//! from a stdin prompt and prints server events.
//!
//! ```text
//! kiosk-panel                        Connect with defaults
//! kiosk-panel --server 10.0.0.5      Override the display address
//! kiosk-panel --gen-config           Dump default config and exit
//! ```
//!
//! Prompt commands: `play <n>`, `reset`, `connect`, `disconnect`,
//! `status`, `quit`.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kiosk_core::{ClientEvent, Command, ConnectionInfo, ConnectionManager, KioskConfig};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kiosk-panel", about = "Kiosk control panel client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "kiosk-panel.toml")]
    config: PathBuf,

    /// Display station address (overrides config). Example: 10.0.0.5
    #[arg(short, long)]
    server: Option<String>,

    /// Display station port (overrides config).
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
    if let Some(server) = cli.server {
        config.network.address = server;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("kiosk-panel v{}", env!("CARGO_PKG_VERSION"));

    let info = ConnectionInfo::new(config.network.address.clone(), config.network.port);
    let (manager, mut events) = ConnectionManager::new(config.retry_interval());

    // Event printer: this is where the real UI would enable/disable
    // controls and reset its selection indicators.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Connected => info!("display connected; controls enabled"),
                ClientEvent::Disconnected => info!("display disconnected; controls disabled"),
                ClientEvent::Received(Command::VideoEnded) => {
                    info!("video ended; selection cleared")
                }
                ClientEvent::Received(Command::Reset) => {
                    info!("display reset; selection cleared")
                }
                ClientEvent::Received(cmd) => warn!("unexpected command from display: {cmd}"),
            }
        }
    });

    manager.connect(info.clone());

    // ── Operator prompt ─────────────────────────────────────────

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("play"), Some(index)) => match index.parse::<u32>() {
                Ok(index) => manager.send(Command::PlayVideo(index)).await,
                Err(_) => warn!("usage: play <n>"),
            },
            (Some("reset"), None) => manager.send(Command::Reset).await,
            (Some("connect"), None) => manager.connect(info.clone()),
            (Some("disconnect"), None) => manager.disconnect().await,
            (Some("status"), None) => info!("{}", manager.status()),
            (Some("quit"), None) | (Some("exit"), None) => break,
            (None, _) => {}
            _ => warn!("commands: play <n> | reset | connect | disconnect | status | quit"),
        }
    }

    info!("shutting down");
    manager.shutdown().await;
    Ok(())
}
