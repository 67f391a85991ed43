//! Station configuration, shared by the display and panel binaries.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a kiosk station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Playback settings (display side).
    pub playback: PlaybackConfig,
    /// Connection settings (panel side).
    pub connection: ConnectionConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
///
/// The display binds `address:port`; the panel connects to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address (display) / server address (panel).
    pub address: String,
    /// TCP port for the command channel.
    pub port: u16,
}

/// Playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds of inactivity before the display returns to the static screen.
    pub inactivity_timeout_secs: u64,
    /// Root directory holding the numbered video assets.
    pub assets_dir: String,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Seconds between connect attempts while the display is unreachable.
    pub retry_interval_secs: f64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            playback: PlaybackConfig::default(),
            connection: ConnectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 30,
            assets_dir: "videos".into(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: 5.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Accessors / Loading ──────────────────────────────────────────

impl KioskConfig {
    /// Inactivity watchdog timeout as a `Duration`.
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.playback.inactivity_timeout_secs)
    }

    /// Connect retry interval as a `Duration`.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.connection.retry_interval_secs.max(0.0))
    }

    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────
