//! Panel-side connection manager.
//!
//! Owns the outbound connection to the display: the retry loop for the
//! initial connect, the receive loop, and the send path. Transport
//! failures never surface as errors to the presentation layer — they
//! become [`ClientEvent`]s, so the UI is told about connectivity loss
//! instead of being left believing it is connected.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::network::{Connection, ConnectionInfo, ConnectionSender};
use crate::state::ConnectionStatus;

// ── ClientEvent ──────────────────────────────────────────────────

/// State notifications and traffic delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The transport is established; controls may be enabled.
    Connected,
    /// The transport is gone; controls must be disabled. Reconnection
    /// is a deliberate user action, not automatic.
    Disconnected,
    /// A command arrived from the display.
    Received(Command),
}

// ── ActiveLink ───────────────────────────────────────────────────

/// The established connection's send handle plus the token that
/// force-closes its receive loop.
#[derive(Debug)]
struct ActiveLink {
    tx: ConnectionSender,
    cancel: CancellationToken,
}

type LinkSlot = Arc<Mutex<Option<ActiveLink>>>;

// ── ConnectionManager ────────────────────────────────────────────

/// Client-side connection lifecycle driver. Cloneable; all clones
/// share the same connection state.
#[derive(Clone)]
pub struct ConnectionManager {
    status: Arc<Mutex<ConnectionStatus>>,
    link: LinkSlot,
    /// Token for the in-flight connect attempt, present from `connect`
    /// until the attempt establishes, aborts, or is cancelled. Lets
    /// `disconnect` stop a retry loop that has not yet found the display.
    attempt: Arc<Mutex<Option<CancellationToken>>>,
    events: mpsc::Sender<ClientEvent>,
    retry_interval: Duration,
    /// Cancelled only on process shutdown; parent of every attempt token.
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager and the event stream consumed by the UI layer.
    pub fn new(retry_interval: Duration) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (events, events_rx) = mpsc::channel(64);
        let manager = Self {
            status: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
            link: Arc::new(Mutex::new(None)),
            attempt: Arc::new(Mutex::new(None)),
            events,
            retry_interval,
            shutdown: CancellationToken::new(),
        };
        (manager, events_rx)
    }

    /// The connection status at this instant.
    pub fn status(&self) -> ConnectionStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Start connecting to `info`, retrying every `retry_interval`
    /// until the display answers.
    ///
    /// No-op if a connect is already in progress or established — the
    /// guard that prevents duplicate retry loops.
    pub fn connect(&self, info: ConnectionInfo) {
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            if status.begin_connect().is_err() {
                debug!("connect ignored: already {status}");
                return;
            }
        }

        let attempt = self.shutdown.child_token();
        *self.attempt.lock().expect("attempt lock poisoned") = Some(attempt.clone());

        let this = self.clone();
        tokio::spawn(async move { this.retry_loop(info, attempt).await });
    }

    /// Connect-with-backoff, then the receive loop, on one task.
    async fn retry_loop(self, info: ConnectionInfo, attempt: CancellationToken) {
        let conn = loop {
            let attempted = tokio::select! {
                _ = attempt.cancelled() => {
                    self.abort_connecting();
                    return;
                }
                attempted = Connection::connect(&info) => attempted,
            };
            match attempted {
                Ok(conn) => break conn,
                Err(e) => {
                    warn!(
                        "connect to {info} failed: {e}; retrying in {:?}",
                        self.retry_interval
                    );
                    tokio::select! {
                        _ = attempt.cancelled() => {
                            self.abort_connecting();
                            return;
                        }
                        _ = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
            }
        };

        self.run_connection(conn, &info, attempt).await;
    }

    async fn run_connection(
        &self,
        mut conn: Connection,
        info: &ConnectionInfo,
        cancel: CancellationToken,
    ) {
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            if status.established().is_err() {
                // A disconnect raced the attempt; drop the fresh transport.
                debug!("connection to {info} aborted before establishment");
                return;
            }
        }
        *self.link.lock().expect("link lock poisoned") = Some(ActiveLink {
            tx: conn.sender(),
            cancel: cancel.clone(),
        });
        info!("connected to {info}");
        let _ = self.events.send(ClientEvent::Connected).await;

        loop {
            let cmd = tokio::select! {
                _ = cancel.cancelled() => break,
                received = conn.recv() => match received {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            debug!("received {cmd}");
            let _ = self.events.send(ClientEvent::Received(cmd)).await;
        }

        // Transport gone (peer close, error, or local disconnect).
        // This teardown runs once per established connection and is the
        // sole emitter of `Disconnected`, pairing it with the earlier
        // `Connected` exactly once. Slots are cleared before the status
        // settles, so a successor's state can never be clobbered.
        self.link.lock().expect("link lock poisoned").take();
        self.attempt.lock().expect("attempt lock poisoned").take();
        self.status
            .lock()
            .expect("status lock poisoned")
            .force_disconnect();
        info!("connection to {info} closed");
        let _ = self.events.send(ClientEvent::Disconnected).await;
    }

    /// Send a command to the display. Logged no-op unless connected;
    /// never an error to the caller.
    pub async fn send(&self, cmd: Command) {
        let tx = self
            .link
            .lock()
            .expect("link lock poisoned")
            .as_ref()
            .map(|l| l.tx.clone());
        match tx {
            Some(tx) => {
                if tx.send(cmd).await.is_err() {
                    warn!("connection closing; dropped {cmd}");
                }
            }
            None => warn!("not connected; dropped {cmd}"),
        }
    }

    /// Close the connection, best-effort sending a `Reset` first.
    /// Idempotent: repeated calls end in the same state and send at
    /// most one `Reset`.
    pub async fn disconnect(&self) {
        let link = self.link.lock().expect("link lock poisoned").take();
        let Some(link) = link else {
            // Not established, but a retry loop may still be hunting
            // for the display; stop it so the panel cannot flip to
            // connected after the operator asked to stop. If the
            // attempt established in the meantime, the cancel tears its
            // receive loop down and that teardown announces the loss.
            let attempt = self.attempt.lock().expect("attempt lock poisoned").take();
            match attempt {
                Some(attempt) if !self.status().is_disconnected() => {
                    self.status
                        .lock()
                        .expect("status lock poisoned")
                        .force_disconnect();
                    attempt.cancel();
                    info!("connect attempt cancelled");
                }
                _ => debug!("disconnect ignored: not connected"),
            }
            return;
        };

        // Queued before the cancel so the transport drains it on teardown.
        let _ = link.tx.send(Command::Reset).await;
        self.status
            .lock()
            .expect("status lock poisoned")
            .force_disconnect();
        link.cancel.cancel();
        info!("disconnected");
    }

    /// Process shutdown: interrupt any retry sleep and drop the
    /// connection. After this the manager will not connect again.
    pub async fn shutdown(&self) {
        // Close the link before cancelling the parent token, so the
        // queued Reset drains instead of racing the receive loop's
        // teardown. Later connects die instantly: their attempt tokens
        // are children of the cancelled token.
        self.disconnect().await;
        self.shutdown.cancel();
        // A retry loop interrupted mid-sleep will also do this, but
        // callers observe a settled state as soon as we return.
        self.status
            .lock()
            .expect("status lock poisoned")
            .force_disconnect();
    }

    fn abort_connecting(&self) {
        self.attempt.lock().expect("attempt lock poisoned").take();
        self.status
            .lock()
            .expect("status lock poisoned")
            .force_disconnect();
        debug!("connect attempt cancelled");
    }
}
