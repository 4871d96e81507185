use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// Identity of one player instance. Events from older instances are stale.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEventKind {
    Ready,
    StateChange(PlayerState),
}

/// Callback posted by the player, tagged with the instance that raised it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerEvent {
    pub generation: Generation,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn ready(generation: Generation) -> Self {
        Self {
            generation,
            kind: PlayerEventKind::Ready,
        }
    }

    pub fn state_change(generation: Generation, state: PlayerState) -> Self {
        Self {
            generation,
            kind: PlayerEventKind::StateChange(state),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player command `{command}` failed: {reason}")]
    CommandFailed {
        command: &'static str,
        reason: String,
    },
}

impl PlayerError {
    pub fn failed(command: &'static str, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            reason: reason.into(),
        }
    }
}

/// Command port into a media player the engine does not own.
///
/// Commands are fire-and-forget: an `Ok` means the command was posted, not
/// that the player has carried it out.
pub trait MediaPlayer {
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self) -> Result<(), PlayerError>;
    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError>;
    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError>;
    /// Last position the player reported, in seconds.
    fn current_time(&self) -> Result<f64, PlayerError>;
    fn state(&self) -> Result<PlayerState, PlayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_advance() {
        let first = Generation::default();
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "gen1");
    }
}
