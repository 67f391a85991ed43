//! Pure state machines for both sides of the protocol.

mod client;
mod playback;

pub use client::ConnectionStatus;
pub use playback::PlaybackPhase;
