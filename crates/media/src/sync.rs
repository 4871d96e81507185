use hitline_domain::MediaTrack;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::player::{
    Generation, MediaPlayer, PlayerError, PlayerEvent, PlayerEventKind, PlayerState,
};

/// Hysteresis and init timing for media reconciliation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Divergence in seconds that must be exceeded before a corrective seek.
    pub resync_threshold_secs: f64,
    /// Minimum time between corrective seeks.
    pub resync_cooldown_ms: f64,
    /// How long to wait for the player's ready callback before giving up on sync.
    pub init_timeout_ms: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            resync_threshold_secs: 0.5,
            resync_cooldown_ms: 2000.0,
            init_timeout_ms: 10_000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    Initializing,
    Ready,
    Playing,
    Paused,
    /// Player never became ready; the session runs without media sync.
    Degraded,
    TornDown,
}

impl SyncPhase {
    fn is_ready(self) -> bool {
        matches!(self, SyncPhase::Ready | SyncPhase::Playing | SyncPhase::Paused)
    }
}

/// What a call to [`MediaSyncController::sync`] did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SyncAction {
    Idle,
    Cued { seconds: f64 },
    Started { seconds: f64 },
    Resynced { from: f64, to: f64 },
    TimedOut,
    Failed,
}

/// Keeps an external player aligned with the game clock.
///
/// The controller never blocks on the player. Every command is best-effort:
/// failures are logged and the next call to `sync` re-evaluates from scratch.
pub struct MediaSyncController {
    track: MediaTrack,
    settings: SyncSettings,
    player: Option<Box<dyn MediaPlayer>>,
    generation: Generation,
    phase: SyncPhase,
    init_started_ms: f64,
    first_play_issued: bool,
    cued: bool,
    last_resync_ms: Option<f64>,
}

impl MediaSyncController {
    pub fn new(track: MediaTrack, settings: SyncSettings) -> Self {
        Self {
            track,
            settings,
            player: None,
            generation: Generation::default(),
            phase: SyncPhase::Uninitialized,
            init_started_ms: 0.0,
            first_play_issued: false,
            cued: false,
            last_resync_ms: None,
        }
    }

    pub fn track(&self) -> &MediaTrack {
        &self.track
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        self.phase.is_ready()
    }

    /// Takes ownership of a freshly created player and waits for its ready event.
    ///
    /// Any previous player is paused and dropped; its events become stale.
    pub fn attach(&mut self, player: Box<dyn MediaPlayer>, now_ms: f64) -> Generation {
        if let Some(mut previous) = self.player.take() {
            log_failure(previous.pause(), self.generation, "pause previous player");
        }
        self.generation = self.generation.next();
        self.player = Some(player);
        self.phase = SyncPhase::Initializing;
        self.init_started_ms = now_ms;
        self.reset_session_state();
        debug!(generation = %self.generation, "media player attached");
        self.generation
    }

    /// Clears per-session flags so a restarted session cues and starts again.
    pub fn reset_session_state(&mut self) {
        self.first_play_issued = false;
        self.cued = false;
        self.last_resync_ms = None;
    }

    /// Applies a player callback. Returns `false` when the event was dropped.
    pub fn handle_event(&mut self, event: PlayerEvent, now_ms: f64) -> bool {
        if self.phase == SyncPhase::TornDown || event.generation != self.generation {
            debug!(
                event_generation = %event.generation,
                current = %self.generation,
                "dropping stale player event"
            );
            return false;
        }
        match event.kind {
            PlayerEventKind::Ready => {
                if self.phase == SyncPhase::Degraded {
                    info!(
                        waited_ms = now_ms - self.init_started_ms,
                        "media player became ready after timeout, resuming sync"
                    );
                }
                self.phase = SyncPhase::Ready;
                self.prepare();
            }
            PlayerEventKind::StateChange(state) => {
                if !self.phase.is_ready() {
                    debug!(?state, phase = ?self.phase, "ignoring state change before ready");
                    return true;
                }
                match state {
                    PlayerState::Playing => self.phase = SyncPhase::Playing,
                    PlayerState::Paused | PlayerState::Ended | PlayerState::Cued => {
                        self.phase = SyncPhase::Paused
                    }
                    PlayerState::Buffering | PlayerState::Unstarted => {}
                }
            }
        }
        true
    }

    fn prepare(&mut self) {
        let rate = self.track.rate();
        let cue = self.track.cue_seconds();
        let generation = self.generation;
        if let Some(player) = self.player.as_mut() {
            log_failure(player.set_playback_rate(rate), generation, "set playback rate");
            if log_failure(player.seek_to(cue, true), generation, "cue seek") {
                self.cued = true;
            }
            info!(cue_seconds = cue, rate, video = %self.track.video_id, "media player ready");
        }
    }

    /// Reconciles the player with the game clock at `elapsed_ms`.
    pub fn sync(&mut self, elapsed_ms: f64, now_ms: f64) -> SyncAction {
        match self.phase {
            SyncPhase::Initializing => {
                if now_ms - self.init_started_ms > self.settings.init_timeout_ms {
                    warn!(
                        timeout_ms = self.settings.init_timeout_ms,
                        generation = %self.generation,
                        "media player did not become ready, continuing without sync"
                    );
                    self.phase = SyncPhase::Degraded;
                    return SyncAction::TimedOut;
                }
                return SyncAction::Idle;
            }
            phase if !phase.is_ready() => return SyncAction::Idle,
            _ => {}
        }

        let generation = self.generation;
        let Some(player) = self.player.as_mut() else {
            return SyncAction::Idle;
        };

        if elapsed_ms < 0.0 {
            self.first_play_issued = false;
            let playing = matches!(player.state(), Ok(PlayerState::Playing));
            if self.cued && !playing {
                return SyncAction::Idle;
            }
            let cue = self.track.cue_seconds();
            let paused = log_failure(player.pause(), generation, "pre-roll pause");
            let seeked = log_failure(player.seek_to(cue, true), generation, "pre-roll cue");
            if paused && seeked {
                self.cued = true;
                return SyncAction::Cued { seconds: cue };
            }
            return SyncAction::Failed;
        }

        if !self.first_play_issued {
            let target = self.track.position_seconds(elapsed_ms);
            let seeked = log_failure(player.seek_to(target, true), generation, "start seek");
            let played = seeked && log_failure(player.play(), generation, "play");
            if !played {
                return SyncAction::Failed;
            }
            self.first_play_issued = true;
            self.cued = false;
            info!(seconds = target, "media playback started");
            return SyncAction::Started { seconds: target };
        }

        let actual = match player.current_time() {
            Ok(seconds) => seconds,
            Err(err) => {
                warn!(error = %err, generation = %generation, "could not read player position");
                return SyncAction::Failed;
            }
        };
        let desired = self.track.position_seconds(elapsed_ms);
        let divergence = (actual - desired).abs();
        if divergence <= self.settings.resync_threshold_secs {
            return SyncAction::Idle;
        }
        let cooled = self
            .last_resync_ms
            .map_or(true, |last| now_ms - last > self.settings.resync_cooldown_ms);
        if !cooled {
            return SyncAction::Idle;
        }
        if !log_failure(player.seek_to(desired, true), generation, "resync seek") {
            return SyncAction::Failed;
        }
        self.last_resync_ms = Some(now_ms);
        info!(from = actual, to = desired, divergence, "media resync");
        SyncAction::Resynced {
            from: actual,
            to: desired,
        }
    }

    /// Pauses playback when the session ends or is paused.
    pub fn pause(&mut self) {
        let generation = self.generation;
        if !self.phase.is_ready() {
            return;
        }
        if let Some(player) = self.player.as_mut() {
            log_failure(player.pause(), generation, "pause");
        }
    }

    /// Marks the session resumed so the next sync restarts playback.
    pub fn resume(&mut self) {
        self.first_play_issued = false;
    }

    /// Pauses and releases the player; later events are ignored.
    pub fn teardown(&mut self) {
        self.pause();
        self.player = None;
        self.phase = SyncPhase::TornDown;
        debug!(generation = %self.generation, "media sync torn down");
    }
}

fn log_failure(result: Result<(), PlayerError>, generation: Generation, action: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, generation = %generation, "{action} failed");
            false
        }
    }
}
