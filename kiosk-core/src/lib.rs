//! # kiosk-core
//!
//! Session & command protocol for an unattended video-display station
//! and its companion control surface.
//!
//! This crate contains:
//! - **Protocol types**: `Command` and its wire text vocabulary
//! - **Codec**: `CommandCodec` for line-delimited TCP I/O via `tokio_util`
//! - **Network**: `Connection` for managed, framed TCP connections
//! - **State**: `PlaybackPhase` and `ConnectionStatus` state machines
//! - **Playback**: `PlaybackController` — the serialized state context
//!   driving the display, with the inactivity watchdog
//! - **Session**: `SessionManager` — single-session TCP acceptor
//! - **Client**: `ConnectionManager` — retry loop and receive loop
//! - **Config**: `KioskConfig` — TOML station configuration
//! - **Error**: `KioskError` — typed, `thiserror`-based error hierarchy

pub mod assets;
pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod network;
pub mod playback;
pub mod session;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{ClientEvent, ConnectionManager};
pub use codec::{CommandCodec, MAX_COMMAND_LEN};
pub use command::Command;
pub use config::KioskConfig;
pub use error::KioskError;
pub use network::{Connection, ConnectionInfo, ConnectionSender};
pub use playback::{
    ControllerEvent, ControllerHandle, PlaybackController, Presenter, ReadyNotifier,
};
pub use session::SessionManager;
pub use state::{ConnectionStatus, PlaybackPhase};
