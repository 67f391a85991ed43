//! Display-side session manager.
//!
//! Accepts at most one control connection at a time. The active
//! session lives in an owned slot under the manager's lock; the accept
//! loop is the only installer and the session's own receive loop the
//! only evictor, so a concurrent second connection is simply dropped
//! on the floor without ever touching the active session's state.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::KioskError;
use crate::network::{Connection, ConnectionSender};
use crate::playback::ControllerHandle;

// ── ActiveSession ────────────────────────────────────────────────

/// The single permitted control connection.
#[derive(Debug)]
struct ActiveSession {
    /// Monotonic id, so a stale receive loop can never evict a successor.
    id: u64,
    tx: ConnectionSender,
}

type SessionSlot = Arc<Mutex<Option<ActiveSession>>>;

// ── SessionManager ───────────────────────────────────────────────

/// Owns the listener, the accept loop, and the active session slot.
pub struct SessionManager {
    active: SessionSlot,
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

impl SessionManager {
    /// Bind `addr` and start accepting control connections.
    ///
    /// Commands decoded from the active session are forwarded to
    /// `controller` in arrival order; commands arriving on
    /// `outbound_rx` (the controller's notifications) are written to
    /// the active session. A bind failure is fatal and never retried.
    pub async fn start(
        addr: &str,
        controller: ControllerHandle,
        mut outbound_rx: mpsc::Receiver<Command>,
    ) -> Result<Self, KioskError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| KioskError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        info!("listening on {local_addr}");

        let active: SessionSlot = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();

        // Outbound forwarder: controller notifications → active session.
        let forward_slot = active.clone();
        tokio::spawn(async move {
            while let Some(cmd) = outbound_rx.recv().await {
                Self::send_to_active(&forward_slot, cmd).await;
            }
        });

        // Accept loop on its own task; never blocks the controller.
        let accept_slot = active.clone();
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut next_id: u64 = 1;
            loop {
                let (stream, peer) = tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("accept failed: {e}");
                            continue;
                        }
                    },
                };

                let id = next_id;
                next_id += 1;
                Self::admit(
                    stream,
                    peer,
                    id,
                    &accept_slot,
                    &controller,
                    &accept_cancel,
                );
            }
            debug!("accept loop stopped");
        });

        Ok(Self {
            active,
            cancel,
            local_addr,
        })
    }

    /// Install `stream` as the active session, or reject it if one is
    /// already connected.
    fn admit(
        stream: TcpStream,
        peer: SocketAddr,
        id: u64,
        slot: &SessionSlot,
        controller: &ControllerHandle,
        cancel: &CancellationToken,
    ) {
        // Check-and-install: the accept loop is the sole installer, so
        // the occupancy check cannot race another admission.
        if slot.lock().expect("session slot lock poisoned").is_some() {
            info!("rejecting concurrent connection from {peer}");
            drop(stream);
            return;
        }

        let mut conn = Connection::new(stream);
        *slot.lock().expect("session slot lock poisoned") = Some(ActiveSession {
            id,
            tx: conn.sender(),
        });
        info!("session {id} connected from {peer}");

        // Receive loop: one per connection, at most one alive at a time.
        let recv_slot = slot.clone();
        let controller = controller.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let cmd = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = conn.recv() => match received {
                        Some(cmd) => cmd,
                        None => break,
                    },
                };
                debug!("session {id} received {cmd}");
                if controller.command(cmd).await.is_err() {
                    warn!("controller gone; closing session {id}");
                    break;
                }
            }

            // Free the slot so a future connection can be accepted, but
            // only if it is still ours.
            let mut guard = recv_slot.lock().expect("session slot lock poisoned");
            if guard.as_ref().map(|s| s.id) == Some(id) {
                *guard = None;
                info!("session {id} closed");
            }
        });
    }

    /// Write a command to the active session; logged no-op when none
    /// is connected.
    pub async fn send(&self, cmd: Command) {
        Self::send_to_active(&self.active, cmd).await;
    }

    async fn send_to_active(slot: &SessionSlot, cmd: Command) {
        let tx = slot
            .lock()
            .expect("session slot lock poisoned")
            .as_ref()
            .map(|s| s.tx.clone());
        match tx {
            Some(tx) => {
                if tx.send(cmd).await.is_err() {
                    warn!("active session closing; dropped {cmd}");
                }
            }
            None => warn!("no session connected; dropped {cmd}"),
        }
    }

    /// The bound address (useful with an ephemeral port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a control connection is currently active.
    pub fn has_session(&self) -> bool {
        self.active
            .lock()
            .expect("session slot lock poisoned")
            .is_some()
    }

    /// Stop accepting, best-effort `Reset` the active session, and
    /// close its transport. Idempotent; safe from a termination handler.
    pub async fn shutdown(&self) {
        let session = self
            .active
            .lock()
            .expect("session slot lock poisoned")
            .take();
        if let Some(session) = session {
            // Queued before the cancel below so the writer task drains
            // it onto the wire while tearing down.
            let _ = session.tx.send(Command::Reset).await;
            info!("session {} reset for shutdown", session.id);
        }
        self.cancel.cancel();
    }
}
