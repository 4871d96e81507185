use std::collections::{HashMap, HashSet};

use hitline_domain::{judge, Judgment, JudgmentWindows, Lane, Note, NoteId, Score, LANE_COUNT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::feedback::{FeedbackEvent, FeedbackQueue};

/// Runtime state of one note during a session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteState {
    pub note: Note,
    /// Resolved: judged, missed, or finished holding.
    pub hit: bool,
    pub y: f64,
    /// Tempo-scaled fall duration, fixed at session start.
    pub fall_ms: f64,
}

impl NoteState {
    pub fn new(note: Note, spawn_y: f64, fall_ms: f64) -> Self {
        Self {
            note,
            hit: false,
            y: spawn_y,
            fall_ms,
        }
    }
}

/// Which part of a note a judgment applies to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum HitPhase {
    Tap,
    HoldStart,
    HoldEnd,
    /// Released before the release window opened.
    EarlyRelease,
    /// Deadline passed with no resolution.
    Expired,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub note: NoteId,
    pub lane: Lane,
    pub judgment: Judgment,
    pub phase: HitPhase,
}

/// Turns lane presses and releases into judgments and score changes.
///
/// All methods take the session's note list so that the clock and the judge
/// see the same resolution flags.
#[derive(Debug)]
pub struct Judge {
    windows: JudgmentWindows,
    release_windows: JudgmentWindows,
    score: Score,
    held: HashMap<NoteId, usize>,
    processed_misses: HashSet<NoteId>,
    pressed: [bool; LANE_COUNT],
    feedback: FeedbackQueue,
}

impl Judge {
    pub fn new(
        windows: JudgmentWindows,
        release_windows: JudgmentWindows,
        feedback_display_ms: f64,
    ) -> Self {
        Self {
            windows,
            release_windows,
            score: Score::new(),
            held: HashMap::new(),
            processed_misses: HashSet::new(),
            pressed: [false; LANE_COUNT],
            feedback: FeedbackQueue::new(feedback_display_ms),
        }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn is_held(&self, id: NoteId) -> bool {
        self.held.contains_key(&id)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn pressed_lanes(&self) -> Vec<Lane> {
        Lane::all().filter(|lane| self.pressed[lane.index()]).collect()
    }

    pub fn feedback(&self) -> Vec<FeedbackEvent> {
        self.feedback.active()
    }

    pub fn expire_feedback(&mut self, now_ms: f64) {
        self.feedback.expire(now_ms);
    }

    /// Clears all per-session bookkeeping.
    pub fn reset(&mut self) {
        self.score = Score::new();
        self.held.clear();
        self.processed_misses.clear();
        self.pressed = [false; LANE_COUNT];
        self.feedback.clear();
    }

    /// Judges a press on `lane` at clock time `now_ms`.
    ///
    /// Picks the closest unresolved, not-yet-held note within the good window.
    /// Taps resolve immediately; holds are judged on their start and kept held.
    pub fn press(
        &mut self,
        lane: Lane,
        now_ms: f64,
        notes: &mut [NoteState],
    ) -> Option<Resolution> {
        self.pressed[lane.index()] = true;

        let mut best: Option<(usize, f64)> = None;
        for (index, state) in notes.iter().enumerate() {
            if state.hit || state.note.lane != lane || self.held.contains_key(&state.note.id) {
                continue;
            }
            let distance = (state.note.time_ms - now_ms).abs();
            if distance > self.windows.good() {
                continue;
            }
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((index, distance));
            }
        }
        let (index, _) = best?;

        let state = &mut notes[index];
        let judgment = judge(state.note.time_ms - now_ms, &self.windows);
        let phase = if state.note.is_hold() {
            self.held.insert(state.note.id, index);
            HitPhase::HoldStart
        } else {
            state.hit = true;
            HitPhase::Tap
        };
        Some(self.resolve(state.note.id, lane, judgment, phase, now_ms))
    }

    /// Judges releases of every note held on `lane`.
    pub fn release(
        &mut self,
        lane: Lane,
        now_ms: f64,
        notes: &mut [NoteState],
    ) -> Vec<Resolution> {
        self.pressed[lane.index()] = false;

        let mut lane_holds: Vec<(NoteId, usize)> = self
            .held
            .iter()
            .filter(|(_, index)| notes.get(**index).is_some_and(|s| s.note.lane == lane))
            .map(|(id, index)| (*id, *index))
            .collect();
        lane_holds.sort_by_key(|(id, _)| *id);

        let window = self.release_windows.good();
        let mut resolutions = Vec::new();
        for (id, index) in lane_holds {
            let state = &mut notes[index];
            if state.hit {
                self.held.remove(&id);
                continue;
            }
            let end = state.note.end_time_ms;
            if (end - now_ms).abs() <= window {
                let judgment = judge(end - now_ms, &self.release_windows);
                state.hit = true;
                self.held.remove(&id);
                resolutions.push(self.resolve(id, lane, judgment, HitPhase::HoldEnd, now_ms));
            } else if now_ms < end - window {
                state.hit = true;
                self.held.remove(&id);
                self.processed_misses.insert(id);
                resolutions.push(self.resolve(
                    id,
                    lane,
                    Judgment::Miss,
                    HitPhase::EarlyRelease,
                    now_ms,
                ));
            }
        }
        resolutions
    }

    /// Records a deadline miss reported by the clock. Returns `None` when the
    /// note was already processed as a miss.
    pub fn record_miss(&mut self, state: &mut NoteState, now_ms: f64) -> Option<Resolution> {
        let id = state.note.id;
        if !self.processed_misses.insert(id) {
            debug!(note = %id, "miss already recorded");
            return None;
        }
        state.hit = true;
        self.held.remove(&id);
        Some(self.resolve(id, state.note.lane, Judgment::Miss, HitPhase::Expired, now_ms))
    }

    fn resolve(
        &mut self,
        note: NoteId,
        lane: Lane,
        judgment: Judgment,
        phase: HitPhase,
        now_ms: f64,
    ) -> Resolution {
        self.score.record(judgment);
        self.feedback.push(judgment, lane, now_ms);
        debug!(note = %note, %lane, %judgment, ?phase, at_ms = now_ms, "note judged");
        Resolution {
            note,
            lane,
            judgment,
            phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(index: u8) -> Lane {
        Lane::new(index).unwrap()
    }

    fn states(notes: Vec<Note>) -> Vec<NoteState> {
        notes
            .into_iter()
            .map(|note| NoteState::new(note, 0.0, 2000.0))
            .collect()
    }

    fn scenario_judge() -> Judge {
        Judge::new(
            JudgmentWindows::new(80.0, 120.0, 160.0).unwrap(),
            JudgmentWindows::new(100.0, 180.0, 260.0).unwrap(),
            800.0,
        )
    }

    #[test]
    fn tap_press_offsets() {
        let cases = [
            (1050.0, Some(Judgment::Perfect)),
            (1140.0, Some(Judgment::Good)),
            (1200.0, None),
        ];
        for (at, expected) in cases {
            let mut judge = scenario_judge();
            let mut notes = states(vec![Note::tap(1, lane(0), 1000.0)]);
            let outcome = judge.press(lane(0), at, &mut notes).map(|r| r.judgment);
            assert_eq!(outcome, expected, "press at {at}");
            assert_eq!(notes[0].hit, expected.is_some());
        }
    }

    #[test]
    fn press_outside_window_is_not_a_miss() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::tap(1, lane(0), 1000.0)]);
        assert!(judge.press(lane(0), 1200.0, &mut notes).is_none());
        assert_eq!(judge.score().miss, 0);
        assert!(judge.feedback().is_empty());
        assert_eq!(judge.pressed_lanes(), vec![lane(0)]);
    }

    #[test]
    fn press_picks_closest_note_in_lane() {
        let mut judge = Judge::new(
            JudgmentWindows::standard(),
            JudgmentWindows::hold_release(),
            800.0,
        );
        let mut notes = states(vec![
            Note::tap(1, lane(1), 1000.0),
            Note::tap(2, lane(1), 1100.0),
            Note::tap(3, lane(2), 1080.0),
        ]);
        let resolution = judge.press(lane(1), 1080.0, &mut notes).unwrap();
        assert_eq!(resolution.note, NoteId(2));
        assert!(notes[1].hit);
        assert!(!notes[0].hit);
        assert!(!notes[2].hit);
    }

    #[test]
    fn hold_release_inside_window() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::hold(1, lane(0), 1000.0, 2000.0)]);
        let start = judge.press(lane(0), 1000.0, &mut notes).unwrap();
        assert_eq!(start.phase, HitPhase::HoldStart);
        assert!(!notes[0].hit);
        assert!(judge.is_held(NoteId(1)));

        let end = judge.release(lane(0), 1950.0, &mut notes);
        assert_eq!(end.len(), 1);
        assert_eq!(end[0].judgment, Judgment::Perfect);
        assert_eq!(end[0].phase, HitPhase::HoldEnd);
        assert!(notes[0].hit);
        assert_eq!(judge.held_count(), 0);
        assert_eq!(judge.score().combo, 2);
    }

    #[test]
    fn early_release_forces_miss() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::hold(1, lane(0), 1000.0, 2000.0)]);
        judge.press(lane(0), 1010.0, &mut notes);
        let end = judge.release(lane(0), 1500.0, &mut notes);
        assert_eq!(end[0].judgment, Judgment::Miss);
        assert_eq!(end[0].phase, HitPhase::EarlyRelease);
        assert!(notes[0].hit);
        assert!(!judge.is_held(NoteId(1)));
        assert_eq!(judge.score().miss, 1);
        assert_eq!(judge.score().combo, 0);

        // the clock must not count it again
        assert!(judge.record_miss(&mut notes[0], 2200.0).is_none());
        assert_eq!(judge.score().miss, 1);
    }

    #[test]
    fn held_note_is_not_judged_twice() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::hold(1, lane(3), 1000.0, 2000.0)]);
        assert!(judge.press(lane(3), 1000.0, &mut notes).is_some());
        assert!(judge.press(lane(3), 1020.0, &mut notes).is_none());
        assert_eq!(judge.score().total_judged(), 1);
    }

    #[test]
    fn release_with_nothing_held_is_noop() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::tap(1, lane(0), 1000.0)]);
        judge.press(lane(0), 1000.0, &mut notes);
        assert!(judge.release(lane(0), 1010.0, &mut notes).is_empty());
        assert!(judge.pressed_lanes().is_empty());
    }

    #[test]
    fn duplicate_miss_counts_once() {
        let mut judge = scenario_judge();
        let mut notes = states(vec![Note::tap(1, lane(0), 1000.0)]);
        assert!(judge.record_miss(&mut notes[0], 1200.0).is_some());
        assert!(judge.record_miss(&mut notes[0], 1216.0).is_none());
        assert_eq!(judge.score().miss, 1);
        assert_eq!(judge.feedback().len(), 1);
    }
}
