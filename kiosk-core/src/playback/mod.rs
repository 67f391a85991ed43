//! Display-side playback controller.
//!
//! The controller is the single serialized context that owns the
//! [`PlaybackPhase`]: network tasks and watchdog timers only enqueue
//! [`ControllerEvent`]s; they never mutate playback state directly.
//! Side effects on the display (fades, static screen, media loading)
//! go through the [`Presenter`] seam, and every return to idle that the
//! client did not itself request is mirrored back over the outbound
//! channel so the control surface can resynchronize.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::KioskError;
use crate::state::PlaybackPhase;

// ── Presenter ────────────────────────────────────────────────────

/// The presentation-layer collaborator driven by the controller.
///
/// Implementations render fades and run the actual player; they are
/// expected to report media readiness back through
/// [`ControllerHandle::media_ready`] once a requested asset can start.
#[async_trait]
pub trait Presenter: Send {
    /// Fade out, swap to the player surface, begin loading asset `index`.
    async fn prepare_video(&mut self, index: u32);

    /// Start playback of the loaded asset and fade in.
    async fn start_playback(&mut self, index: u32);

    /// Stop playback, fade out, show the static screen, fade in.
    async fn show_idle(&mut self);
}

// ── Events ───────────────────────────────────────────────────────

/// Work items delivered to the controller's serialized context.
#[derive(Debug)]
pub enum ControllerEvent {
    /// A command received from the control surface.
    Command(Command),
    /// The presenter finished loading the asset requested last.
    MediaReady,
    /// The inactivity watchdog for generation `.0` elapsed.
    WatchdogFired(u64),
}

// ── ControllerHandle ─────────────────────────────────────────────

/// Cloneable handle for enqueueing events and observing the phase.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerEvent>,
    phase_rx: watch::Receiver<PlaybackPhase>,
}

impl ControllerHandle {
    /// Enqueue a received command.
    pub async fn command(&self, cmd: Command) -> Result<(), KioskError> {
        self.tx
            .send(ControllerEvent::Command(cmd))
            .await
            .map_err(Into::into)
    }

    /// Signal that the presenter finished loading the requested asset.
    pub async fn media_ready(&self) -> Result<(), KioskError> {
        self.tx
            .send(ControllerEvent::MediaReady)
            .await
            .map_err(Into::into)
    }

    /// The phase at this instant.
    pub fn phase(&self) -> PlaybackPhase {
        *self.phase_rx.borrow()
    }

    /// A watch receiver that yields every phase change.
    pub fn phase_watch(&self) -> watch::Receiver<PlaybackPhase> {
        self.phase_rx.clone()
    }

    /// A weak media-ready notifier for handing to a [`Presenter`].
    ///
    /// Weak on purpose: the controller owns the presenter, so a strong
    /// sender held there would keep the event channel open forever and
    /// the controller could never observe teardown.
    pub fn ready_notifier(&self) -> ReadyNotifier {
        ReadyNotifier {
            tx: self.tx.downgrade(),
        }
    }
}

// ── ReadyNotifier ────────────────────────────────────────────────

/// Presenter-side handle for reporting that a requested asset is
/// loaded and playback can start.
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    tx: mpsc::WeakSender<ControllerEvent>,
}

impl ReadyNotifier {
    /// Signal media readiness; silently dropped if the controller is gone.
    pub async fn media_ready(&self) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(ControllerEvent::MediaReady).await;
        }
    }
}

// ── PlaybackController ───────────────────────────────────────────

/// State machine driver for the display.
///
/// Construct with [`new`](Self::new), then spawn [`run`](Self::run) on
/// the runtime. The controller exits once every [`ControllerHandle`]
/// has been dropped, returning the presenter to the static screen.
pub struct PlaybackController {
    phase: PlaybackPhase,
    inactivity_timeout: Duration,
    /// Current watchdog generation; a fired timer carrying an older
    /// generation is stale and ignored, so a reschedule deterministically
    /// invalidates the prior timer.
    watchdog_gen: u64,
    events_rx: mpsc::Receiver<ControllerEvent>,
    /// Weak so the controller's own watchdog tasks never keep the
    /// event channel open after all external handles are gone.
    events_tx: mpsc::WeakSender<ControllerEvent>,
    outbound: mpsc::Sender<Command>,
    phase_tx: watch::Sender<PlaybackPhase>,
}

impl PlaybackController {
    /// Create a controller and its handle.
    ///
    /// `outbound` carries server→client notifications (`VideoEnded`);
    /// wire it to the session manager's outbound queue, or to a plain
    /// receiver in tests.
    pub fn new(
        inactivity_timeout: Duration,
        outbound: mpsc::Sender<Command>,
    ) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(64);
        let (phase_tx, phase_rx) = watch::channel(PlaybackPhase::Idle);

        let controller = Self {
            phase: PlaybackPhase::Idle,
            inactivity_timeout,
            watchdog_gen: 0,
            events_rx: rx,
            events_tx: tx.downgrade(),
            outbound,
            phase_tx,
        };
        let handle = ControllerHandle { tx, phase_rx };
        (controller, handle)
    }

    /// Process events until every handle is dropped.
    pub async fn run(mut self, mut presenter: Box<dyn Presenter>) {
        while let Some(event) = self.events_rx.recv().await {
            match event {
                ControllerEvent::Command(cmd) => {
                    self.handle_command(cmd, presenter.as_mut()).await;
                }
                ControllerEvent::MediaReady => {
                    self.handle_media_ready(presenter.as_mut()).await;
                }
                ControllerEvent::WatchdogFired(generation) => {
                    self.handle_watchdog(generation, presenter.as_mut()).await;
                }
            }
        }

        // Teardown: leave the display on the static screen.
        if !self.phase.is_idle() {
            self.go_idle(presenter.as_mut(), None).await;
        }
    }

    async fn handle_command(&mut self, cmd: Command, presenter: &mut dyn Presenter) {
        match cmd {
            Command::PlayVideo(index) => match self.phase.begin_prepare(index) {
                Ok(()) => {
                    info!("preparing video {index}");
                    self.cancel_watchdog();
                    presenter.prepare_video(index).await;
                    self.publish_phase();
                }
                Err(_) => {
                    // Only one prepare in flight; later requests wait for
                    // the current load to resolve.
                    debug!("ignoring PlayVideo({index}) while preparing");
                }
            },
            Command::Reset => {
                if self.phase.is_idle() {
                    debug!("ignoring Reset while idle");
                } else {
                    info!("client requested reset");
                    // Client-initiated: no echo, the panel already knows.
                    self.go_idle(presenter, None).await;
                }
            }
            Command::VideoEnded => {
                debug!("ignoring VideoEnded from client");
            }
        }

        // All inbound traffic counts as activity while playing.
        if self.phase.is_playing() {
            self.arm_watchdog();
        }
    }

    async fn handle_media_ready(&mut self, presenter: &mut dyn Presenter) {
        match self.phase.media_ready() {
            Ok(()) => {
                let index = self.phase.video_index().unwrap_or_default();
                info!("video {index} ready; starting playback");
                presenter.start_playback(index).await;
                self.arm_watchdog();
                self.publish_phase();
            }
            Err(_) => {
                // A reset raced the load; the player surface was already
                // torn down, so the ready signal is moot.
                debug!("ignoring media-ready in phase {}", self.phase);
            }
        }
    }

    async fn handle_watchdog(&mut self, generation: u64, presenter: &mut dyn Presenter) {
        if generation != self.watchdog_gen {
            debug!("ignoring stale watchdog (gen {generation})");
            return;
        }
        if self.phase.is_playing() {
            info!(
                "no activity for {:?}; returning to static screen",
                self.inactivity_timeout
            );
            self.go_idle(presenter, Some(Command::VideoEnded)).await;
        }
    }

    /// Return to the static screen, optionally notifying the client.
    async fn go_idle(&mut self, presenter: &mut dyn Presenter, notify: Option<Command>) {
        self.phase.reset();
        self.cancel_watchdog();
        presenter.show_idle().await;
        self.publish_phase();

        if let Some(cmd) = notify {
            if self.outbound.send(cmd).await.is_err() {
                warn!("outbound channel closed; dropping {cmd}");
            }
        }
    }

    /// Cancel-and-reschedule: bump the generation and start a fresh timer.
    fn arm_watchdog(&mut self) {
        self.watchdog_gen += 1;
        let generation = self.watchdog_gen;
        let timeout = self.inactivity_timeout;
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(ControllerEvent::WatchdogFired(generation)).await;
            }
        });
    }

    /// Invalidate any outstanding timer without starting a new one.
    fn cancel_watchdog(&mut self) {
        self.watchdog_gen += 1;
    }

    fn publish_phase(&self) {
        self.phase_tx.send_replace(self.phase);
    }
}

// ── Tests ────────────────────────────────────────────────────────
