//! Protocol command vocabulary and wire text parsing.
//!
//! The wire format is plain UTF-8 text, one command per line. Parsing
//! uses `TryFrom`-style fallible constructors — no panics on unknown
//! or malformed input.

use std::fmt;

use crate::error::KioskError;

// ── Command ──────────────────────────────────────────────────────

/// A parsed protocol message.
///
/// Immutable value produced by the codec and consumed by the session
/// manager / client event loop; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Request playback of the asset with the given index (client → server).
    PlayVideo(u32),
    /// Force return to idle / resync (both directions).
    Reset,
    /// Playback completed naturally or was reset (server → client).
    VideoEnded,
}

impl Command {
    /// Parse a single line of wire text (without the terminator).
    pub fn parse_wire(line: &str) -> Result<Self, KioskError> {
        match line {
            "Reset" => Ok(Command::Reset),
            "VideoEnded" => Ok(Command::VideoEnded),
            _ => match line.split_once(':') {
                Some(("PlayVideo", index)) => index
                    .parse::<u32>()
                    .map(Command::PlayVideo)
                    .map_err(|_| KioskError::InvalidCommand(line.to_string())),
                _ => Err(KioskError::InvalidCommand(line.to_string())),
            },
        }
    }

    /// Render the wire text for this command (without the terminator).
    pub fn wire(&self) -> String {
        match self {
            Command::PlayVideo(index) => format!("PlayVideo:{index}"),
            Command::Reset => "Reset".to_string(),
            Command::VideoEnded => "VideoEnded".to_string(),
        }
    }

    /// The asset index carried by this command, if any.
    pub fn video_index(&self) -> Option<u32> {
        match self {
            Command::PlayVideo(index) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_play_video() {
        assert_eq!(Command::parse_wire("PlayVideo:3").unwrap(), Command::PlayVideo(3));
        assert_eq!(Command::parse_wire("PlayVideo:0").unwrap(), Command::PlayVideo(0));
    }

    #[test]
    fn parse_bare_commands() {
        assert_eq!(Command::parse_wire("Reset").unwrap(), Command::Reset);
        assert_eq!(Command::parse_wire("VideoEnded").unwrap(), Command::VideoEnded);
    }

    #[test]
    fn wire_roundtrip() {
        for cmd in [Command::PlayVideo(3), Command::Reset, Command::VideoEnded] {
            assert_eq!(Command::parse_wire(&cmd.wire()).unwrap(), cmd);
        }
    }

    #[test]
    fn parse_rejects_bad_payload() {
        assert!(Command::parse_wire("PlayVideo:abc").is_err());
        assert!(Command::parse_wire("PlayVideo:").is_err());
        assert!(Command::parse_wire("PlayVideo:-1").is_err());
    }

    #[test]
    fn parse_rejects_unknown_verbs() {
        assert!(Command::parse_wire("").is_err());
        assert!(Command::parse_wire("Pause").is_err());
        assert!(Command::parse_wire("reset").is_err()); // case-sensitive
    }

    #[test]
    fn video_index_accessor() {
        assert_eq!(Command::PlayVideo(7).video_index(), Some(7));
        assert_eq!(Command::Reset.video_index(), None);
    }
}
