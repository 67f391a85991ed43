//! Managed TCP connection carrying [`Command`] frames.
//!
//! Wraps a `TcpStream` in a [`Framed`] codec driven by one background
//! task that shuttles commands between the socket and a pair of mpsc
//! channels. The task owns the stream outright, so dropping the handle
//! tears it down and closes the socket; already-queued commands are
//! drained onto the wire first, which is what makes a best-effort
//! `Reset` before close actually reach the peer.

use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::CommandCodec;
use crate::command::Command;

/// Sender half usable from other tasks to queue outbound commands.
pub type ConnectionSender = mpsc::Sender<Command>;

/// A command-framed connection to a single peer.
#[derive(Debug)]
pub struct Connection {
    // Channel to the background writer task.
    tx: mpsc::Sender<Command>,
    // Channel from the background reader task.
    rx: mpsc::Receiver<Command>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let mut framed = Framed::new(stream, CommandCodec);

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel(64);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(64);

        // One task owns the stream in both directions. It exits when
        // every sender is gone, the receiver is gone, or the transport
        // closes; the stream drops with it, so the peer sees EOF.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = network_rx.recv() => match outbound {
                        Some(cmd) => {
                            if let Err(e) = framed.send(cmd).await {
                                debug!("network write error: {e}");
                                break;
                            }
                        }
                        // Handle dropped, tear down.
                        None => break,
                    },
                    inbound = framed.next() => match inbound {
                        Some(Ok(cmd)) => {
                            if network_tx.send(cmd).await.is_err() {
                                // user_rx was dropped, stop reading
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            debug!("network read error: {e}");
                            break;
                        }
                        // Peer closed.
                        None => break,
                    },
                }
            }

            // Flush commands queued before the handle dropped, then
            // close our half so the peer observes EOF promptly.
            while let Ok(cmd) = network_rx.try_recv() {
                if framed.send(cmd).await.is_err() {
                    break;
                }
            }
            let _ = framed.close().await;
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    /// Open a connection to `info`.
    pub async fn connect(info: &ConnectionInfo) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(info.to_string()).await?;
        Ok(Self::new(stream))
    }

    /// Queue a command for the writer task.
    pub async fn send(&self, cmd: Command) -> Result<(), mpsc::error::SendError<Command>> {
        self.tx.send(cmd).await
    }

    /// Receive the next inbound command. `None` once the peer closes
    /// or the transport errors.
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// A cloneable sender for queueing outbound commands from other tasks.
    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

/// Remote endpoint address: IP + port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    ip: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(ip: String, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Connection::new(client), Connection::new(server))
    }

    #[tokio::test]
    async fn drop_closes_socket() {
        let (client, mut server) = connected_pair().await;

        drop(client);
        let closed = tokio::time::timeout(Duration::from_secs(5), server.recv())
            .await
            .expect("peer never observed close");
        assert_eq!(closed, None);
    }

    #[tokio::test]
    async fn queued_command_drains_before_close() {
        let (client, mut server) = connected_pair().await;

        client.send(Command::Reset).await.unwrap();
        drop(client);

        assert_eq!(server.recv().await, Some(Command::Reset));
        assert_eq!(server.recv().await, None);
    }

    #[test]
    fn connection_info_display() {
        let info = ConnectionInfo::new("192.168.1.10".into(), 3000);
        assert_eq!(info.to_string(), "192.168.1.10:3000");
        assert_eq!(info.ip(), "192.168.1.10");
        assert_eq!(info.port(), 3000);
    }
}
