use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TimelineSettings;
use crate::judging::{Judge, NoteState, Resolution};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClockPhase {
    Idle,
    Running,
    Paused,
    Ended,
}

/// Authoritative session time. Elapsed time is negative during pre-roll.
#[derive(Clone, Debug)]
pub struct GameClock {
    phase: ClockPhase,
    start_reference_ms: f64,
    paused_at_ms: f64,
    ended_at_elapsed_ms: f64,
}

impl GameClock {
    pub fn new() -> Self {
        Self {
            phase: ClockPhase::Idle,
            start_reference_ms: 0.0,
            paused_at_ms: 0.0,
            ended_at_elapsed_ms: 0.0,
        }
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == ClockPhase::Running
    }

    /// Starts (or restarts) so that elapsed time reads `-pre_roll_ms` at `now_ms`.
    pub fn start(&mut self, now_ms: f64, pre_roll_ms: f64) {
        self.start_reference_ms = now_ms + pre_roll_ms.max(0.0);
        self.phase = ClockPhase::Running;
        debug!(now_ms, pre_roll_ms, "clock started");
    }

    pub fn pause(&mut self, now_ms: f64) {
        if self.phase == ClockPhase::Running {
            self.paused_at_ms = now_ms;
            self.phase = ClockPhase::Paused;
        }
    }

    /// Shifts the start reference by the paused span so no time is lost.
    pub fn resume(&mut self, now_ms: f64) {
        if self.phase == ClockPhase::Paused {
            self.start_reference_ms += now_ms - self.paused_at_ms;
            self.phase = ClockPhase::Running;
        }
    }

    pub fn end(&mut self, now_ms: f64) {
        if self.phase != ClockPhase::Ended {
            self.ended_at_elapsed_ms = self.elapsed_at(now_ms);
            self.phase = ClockPhase::Ended;
        }
    }

    pub fn elapsed_at(&self, now_ms: f64) -> f64 {
        match self.phase {
            ClockPhase::Idle => 0.0,
            ClockPhase::Running => now_ms - self.start_reference_ms,
            ClockPhase::Paused => self.paused_at_ms - self.start_reference_ms,
            ClockPhase::Ended => self.ended_at_elapsed_ms,
        }
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tick note positioning and deadline misses.
#[derive(Clone, Copy, Debug)]
pub struct Timeline {
    settings: TimelineSettings,
    miss_threshold_ms: f64,
}

impl Timeline {
    pub fn new(settings: TimelineSettings, miss_threshold_ms: f64) -> Self {
        Self {
            settings,
            miss_threshold_ms,
        }
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    /// Updates every unresolved note against one `elapsed_ms` snapshot.
    pub fn advance(
        &self,
        elapsed_ms: f64,
        notes: &mut [NoteState],
        judge: &mut Judge,
    ) -> Vec<Resolution> {
        let mut misses = Vec::new();
        for state in notes.iter_mut() {
            if state.hit {
                continue;
            }
            let remaining = state.note.time_ms - elapsed_ms;
            if remaining > state.fall_ms {
                state.y = self.settings.spawn_y;
                continue;
            }
            if state.note.deadline_ms() - elapsed_ms < -self.miss_threshold_ms {
                if let Some(miss) = judge.record_miss(state, elapsed_ms) {
                    misses.push(miss);
                }
                state.y = self.settings.missed_y;
                continue;
            }
            state.y = self.position(remaining, state.fall_ms);
        }
        misses
    }

    fn position(&self, remaining_ms: f64, fall_ms: f64) -> f64 {
        let progress = if fall_ms > 0.0 {
            (1.0 - remaining_ms / fall_ms).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let TimelineSettings {
            spawn_y,
            judge_line_y,
            ..
        } = self.settings;
        spawn_y + progress * (judge_line_y - spawn_y)
    }
}
