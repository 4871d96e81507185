pub mod player;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod sync;

pub use crate::player::{
    Generation, MediaPlayer, PlayerError, PlayerEvent, PlayerEventKind, PlayerState,
};
#[cfg(any(test, feature = "test-util"))]
pub use crate::scripted::{PlayerCommand, ScriptedPlayer};
pub use crate::sync::{MediaSyncController, SyncAction, SyncPhase, SyncSettings};
