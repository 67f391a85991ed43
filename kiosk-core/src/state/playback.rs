//! Display-side playback state machine.
//!
//! Provides a `PlaybackPhase` enum that models the full playback
//! lifecycle, with validated transitions that return `Result` instead
//! of panicking.

use crate::error::KioskError;

// ── PlaybackPhase ────────────────────────────────────────────────

/// The current phase of the display's playback lifecycle.
///
/// ```text
///            PlayVideo(i)             MediaReady
///  Idle ───────────────► Preparing ─────────────► Playing
///   ▲                                                │ │
///   │          watchdog expiry / Reset               │ │ PlayVideo(j)
///   └────────────────────────────────────────────────┘ └──► Preparing
/// ```
///
/// Invariant: a video index is carried iff the phase is `Preparing`
/// or `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    /// Static screen shown. Initial state.
    #[default]
    Idle,

    /// Media load requested for `index`, not yet ready.
    Preparing { index: u32 },

    /// Media for `index` actively rendering; inactivity watchdog armed.
    Playing { index: u32 },
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Preparing { index } => write!(f, "Preparing({index})"),
            Self::Playing { index } => write!(f, "Playing({index})"),
        }
    }
}

impl PlaybackPhase {
    /// Returns `true` when showing the static screen.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` while a media load is outstanding.
    pub fn is_preparing(&self) -> bool {
        matches!(self, Self::Preparing { .. })
    }

    /// Returns `true` while media is rendering.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// The video index currently loading or playing, if any.
    pub fn video_index(&self) -> Option<u32> {
        match self {
            Self::Preparing { index } | Self::Playing { index } => Some(*index),
            Self::Idle => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Preparing { index }`.
    ///
    /// Valid from: `Idle`, `Playing` (a new request supersedes whatever
    /// is currently shown). Rejected from `Preparing` — only one prepare
    /// may be in flight, regardless of index.
    pub fn begin_prepare(&mut self, index: u32) -> Result<(), KioskError> {
        match self {
            Self::Idle | Self::Playing { .. } => {
                *self = Self::Preparing { index };
                Ok(())
            }
            Self::Preparing { .. } => Err(KioskError::ProtocolViolation(
                "cannot prepare: a prepare is already in flight",
            )),
        }
    }

    /// Transition to `Playing`.
    ///
    /// Valid from: `Preparing`.
    pub fn media_ready(&mut self) -> Result<(), KioskError> {
        match self {
            Self::Preparing { index } => {
                *self = Self::Playing { index: *index };
                Ok(())
            }
            _ => Err(KioskError::ProtocolViolation(
                "media ready outside of Preparing",
            )),
        }
    }

    /// Force-reset to `Idle` regardless of current state.
    ///
    /// Covers watchdog expiry, an explicit `Reset`, and teardown.
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = PlaybackPhase::Idle;

        phase.begin_prepare(2).unwrap();
        assert_eq!(phase, PlaybackPhase::Preparing { index: 2 });
        assert_eq!(phase.video_index(), Some(2));

        phase.media_ready().unwrap();
        assert!(phase.is_playing());
        assert_eq!(phase.video_index(), Some(2));

        phase.reset();
        assert!(phase.is_idle());
        assert_eq!(phase.video_index(), None);
    }

    #[test]
    fn prepare_rejected_while_preparing() {
        let mut phase = PlaybackPhase::Preparing { index: 0 };
        assert!(phase.begin_prepare(1).is_err());
        // Same index is rejected too — one prepare in flight, full stop.
        assert!(phase.begin_prepare(0).is_err());
        assert_eq!(phase, PlaybackPhase::Preparing { index: 0 });
    }

    #[test]
    fn prepare_supersedes_playing() {
        let mut phase = PlaybackPhase::Playing { index: 0 };
        phase.begin_prepare(5).unwrap();
        assert_eq!(phase, PlaybackPhase::Preparing { index: 5 });
    }

    #[test]
    fn media_ready_invalid_outside_preparing() {
        let mut phase = PlaybackPhase::Idle;
        assert!(phase.media_ready().is_err());

        let mut phase = PlaybackPhase::Playing { index: 1 };
        assert!(phase.media_ready().is_err());
    }

    #[test]
    fn reset_from_any_state() {
        for mut phase in [
            PlaybackPhase::Idle,
            PlaybackPhase::Preparing { index: 3 },
            PlaybackPhase::Playing { index: 3 },
        ] {
            phase.reset();
            assert!(phase.is_idle());
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(PlaybackPhase::Idle.to_string(), "Idle");
        assert_eq!(PlaybackPhase::Preparing { index: 4 }.to_string(), "Preparing(4)");
        assert_eq!(PlaybackPhase::Playing { index: 4 }.to_string(), "Playing(4)");
    }

    #[test]
    fn default_phase_is_idle() {
        assert!(PlaybackPhase::default().is_idle());
    }
}
