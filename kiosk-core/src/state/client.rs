//! Client-side connection lifecycle state machine.

use std::time::Instant;

use crate::error::KioskError;

// ── ConnectionStatus ─────────────────────────────────────────────

/// The current status of the panel's connection to the display.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       └───────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// Retry loop running; no transport established yet.
    Connecting,

    /// Transport established; send operations are valid.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl ConnectionStatus {
    /// Returns `true` when the transport is established and sends are valid.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Returns `true` when no connect attempt is in progress.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been established, if it is.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`. The `Err` from any other state is the
    /// idempotent start guard — a second `connect()` must not spawn a
    /// second retry loop.
    pub fn begin_connect(&mut self) -> Result<(), KioskError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(KioskError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn established(&mut self) -> Result<(), KioskError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(KioskError::ProtocolViolation(
                "cannot establish: not in Connecting state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
