//! Integration tests — full session lifecycle, command round-trips,
//! and error scenarios over a real TCP connection on localhost.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use kiosk_core::{
    ClientEvent, Command, Connection, ConnectionInfo, ConnectionManager, ControllerHandle,
    KioskError, PlaybackController, PlaybackPhase, Presenter, SessionManager,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Presenter that reports media-ready as soon as a load is requested.
struct AutoReadyPresenter {
    ready: kiosk_core::ReadyNotifier,
}

#[async_trait]
impl Presenter for AutoReadyPresenter {
    async fn prepare_video(&mut self, _index: u32) {
        let ready = self.ready.clone();
        tokio::spawn(async move {
            ready.media_ready().await;
        });
    }

    async fn start_playback(&mut self, _index: u32) {}

    async fn show_idle(&mut self) {}
}

/// Spin up a display server on an OS-assigned port.
async fn start_display(
    inactivity_timeout: Duration,
) -> (SessionManager, ControllerHandle, ConnectionInfo) {
    start_display_at("127.0.0.1:0", inactivity_timeout)
        .await
        .expect("bind failed")
}

async fn start_display_at(
    addr: &str,
    inactivity_timeout: Duration,
) -> Result<(SessionManager, ControllerHandle, ConnectionInfo), KioskError> {
    let (out_tx, out_rx) = mpsc::channel(16);
    let (controller, handle) = PlaybackController::new(inactivity_timeout, out_tx);
    let session = SessionManager::start(addr, handle.clone(), out_rx).await?;

    let presenter = AutoReadyPresenter {
        ready: handle.ready_notifier(),
    };
    tokio::spawn(controller.run(Box::new(presenter)));

    let local = session.local_addr();
    let info = ConnectionInfo::new(local.ip().to_string(), local.port());
    Ok((session, handle, info))
}

/// Wait until the phase watch reports a state matching `want`.
async fn wait_for_phase(handle: &ControllerHandle, want: impl Fn(&PlaybackPhase) -> bool) {
    let mut rx = handle.phase_watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if want(&rx.borrow_and_update()) {
                return;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("phase not reached in time");
}

/// Receive the next client event, failing the test after 5 seconds.
async fn next_event(rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout waiting for client event")
        .expect("event channel closed")
}

// ── Scenario A: full play / timeout / notify cycle ───────────────

#[tokio::test]
async fn scenario_a_play_then_inactivity_notifies_client() {
    let (_session, handle, info) = start_display(Duration::from_millis(150)).await;

    let (manager, mut events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info);
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    manager.send(Command::PlayVideo(0)).await;
    wait_for_phase(&handle, |p| *p == PlaybackPhase::Playing { index: 0 }).await;

    // No further traffic: the display must time out, return to the
    // static screen, and tell the panel exactly once.
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Received(Command::VideoEnded)
    );
    wait_for_phase(&handle, |p| p.is_idle()).await;

    let extra = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(extra.is_err(), "unexpected extra event: {extra:?}");
}

// ── Scenario B: retry until the server appears ───────────────────

#[tokio::test]
async fn scenario_b_client_retries_until_server_starts() {
    // Reserve a port, then release it so the first attempts fail.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    let (manager, mut events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info);

    // Let a few attempts fail before the display shows up.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let (_session, _handle, _info) = start_display_at(&addr.to_string(), Duration::from_secs(30))
        .await
        .expect("rebind failed");

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert!(manager.status().is_connected());
}

// ── Scenario C: concurrent connections, one winner ───────────────

#[tokio::test]
async fn second_connection_rejected_without_disturbing_first() {
    let (session, handle, info) = start_display(Duration::from_secs(30)).await;

    let first = Connection::connect(&info).await.unwrap();
    // Wait for the accept loop to install the session.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !session.has_session() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The extra transport is closed immediately, no message sent.
    let mut second = TcpStream::connect(info.to_string()).await.unwrap();
    let _ = second.write_all(b"PlayVideo:9\n").await;
    let mut buf = [0u8; 16];
    // EOF or a reset error both mean "closed, nothing sent".
    let n = tokio::time::timeout(Duration::from_secs(5), second.read(&mut buf))
        .await
        .expect("rejected connection not closed")
        .unwrap_or(0);
    assert_eq!(n, 0, "server wrote to a rejected connection");

    // Nothing from the rejected transport ever reached the controller.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(handle.phase().is_idle());

    // The surviving session still drives playback.
    first.send(Command::PlayVideo(1)).await.unwrap();
    wait_for_phase(&handle, |p| *p == PlaybackPhase::Playing { index: 1 }).await;
}

// ── Session teardown / reacceptance ──────────────────────────────

#[tokio::test]
async fn server_accepts_again_after_client_drops() {
    let (session, handle, info) = start_display(Duration::from_secs(30)).await;

    let first = Connection::connect(&info).await.unwrap();
    first.send(Command::PlayVideo(0)).await.unwrap();
    wait_for_phase(&handle, |p| p.is_playing()).await;

    drop(first);
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.has_session() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session slot not freed");

    // A fresh connection is admitted and fully functional.
    let second = Connection::connect(&info).await.unwrap();
    second.send(Command::PlayVideo(2)).await.unwrap();
    wait_for_phase(&handle, |p| *p == PlaybackPhase::Playing { index: 2 }).await;
}

// ── Disconnect idempotence ───────────────────────────────────────

#[tokio::test]
async fn disconnect_twice_sends_at_most_one_reset() {
    // Raw listener so we can count exactly what hits the wire.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());

    let (manager, mut events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info);

    let (stream, _) = listener.accept().await.unwrap();
    let mut server_conn = Connection::new(stream);
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    manager.disconnect().await;
    manager.disconnect().await;
    assert!(manager.status().is_disconnected());

    // Exactly one Reset, then EOF.
    let first = tokio::time::timeout(Duration::from_secs(5), server_conn.recv())
        .await
        .expect("timeout");
    assert_eq!(first, Some(Command::Reset));
    let second = tokio::time::timeout(Duration::from_secs(5), server_conn.recv())
        .await
        .expect("timeout");
    assert_eq!(second, None);

    // Exactly one Disconnected notification.
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
    let extra = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(extra.is_err(), "unexpected extra event: {extra:?}");
}

#[tokio::test]
async fn disconnect_while_connecting_stops_retrying() {
    // Reserve a port with no display behind it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    let (manager, mut events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info);
    assert!(!manager.status().is_disconnected());

    // The operator gives up before the display ever appears.
    manager.disconnect().await;
    assert!(manager.status().is_disconnected());

    // Bring the display up where the retry loop was looking; a stopped
    // loop must not connect to it.
    let (session, _handle, _info) = start_display_at(&addr.to_string(), Duration::from_secs(30))
        .await
        .expect("rebind failed");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!session.has_session(), "retry loop survived disconnect");
    assert!(manager.status().is_disconnected());

    // No Connected/Disconnected chatter for a never-established attempt.
    let stray = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
    assert!(stray.is_err(), "unexpected event: {stray:?}");
}

#[tokio::test]
async fn client_notified_when_server_closes() {
    let (session, _handle, info) = start_display(Duration::from_secs(30)).await;

    let (manager, mut events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info);
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    // Display shuts down: best-effort Reset, then the transport closes.
    session.shutdown().await;
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Received(Command::Reset)
    );
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
    assert!(manager.status().is_disconnected());
}

// ── Error scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn bind_failure_is_fatal() {
    let (session, _handle, _info) = start_display(Duration::from_secs(30)).await;
    let taken = session.local_addr().to_string();

    let result = start_display_at(&taken, Duration::from_secs(30)).await;
    assert!(matches!(result, Err(KioskError::Bind { .. })));
}

#[tokio::test]
async fn send_without_session_is_logged_noop() {
    let (session, _handle, _info) = start_display(Duration::from_secs(30)).await;
    // No client connected; must not panic or error.
    session.send(Command::VideoEnded).await;
}

#[tokio::test]
async fn malformed_command_does_not_kill_session() {
    let (session, handle, info) = start_display(Duration::from_secs(30)).await;

    let mut raw = TcpStream::connect(info.to_string()).await.unwrap();
    raw.write_all(b"PlayVideo:banana\n").await.unwrap();
    raw.write_all(b"PlayVideo:4\n").await.unwrap();

    // The malformed line is dropped; the valid one still lands.
    wait_for_phase(&handle, |p| *p == PlaybackPhase::Playing { index: 4 }).await;
    assert!(session.has_session());
}

#[tokio::test]
async fn connect_is_idempotent_while_connecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    let (manager, _events) = ConnectionManager::new(Duration::from_millis(50));
    manager.connect(info.clone());
    // Duplicate calls must not spawn a second retry loop.
    manager.connect(info.clone());
    manager.connect(info);
    assert!(!manager.status().is_disconnected());

    manager.shutdown().await;
    assert!(manager.status().is_disconnected());
}
