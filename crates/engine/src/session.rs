use hitline_domain::{
    Chart, Lane, NoteId, NoteKind, Score, SessionReport, TempoWarning, TimeSource,
};
use hitline_media::{
    Generation, MediaPlayer, MediaSyncController, PlayerEvent, SyncAction, SyncPhase,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::clock::{ClockPhase, GameClock, Timeline};
use crate::config::EngineConfig;
use crate::feedback::FeedbackEvent;
use crate::judging::{Judge, NoteState, Resolution};

/// What one tick changed.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub elapsed_ms: f64,
    pub misses: Vec<Resolution>,
    pub sync: Option<SyncAction>,
    pub ended: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: NoteId,
    pub lane: Lane,
    pub kind: NoteKind,
    pub y: f64,
    pub hit: bool,
    pub held: bool,
}

/// Read-only view of a session for the render layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: ClockPhase,
    pub elapsed_ms: f64,
    pub duration_ms: f64,
    pub notes: Vec<NoteView>,
    pub score: Score,
    pub accuracy: f64,
    pub feedback: Vec<FeedbackEvent>,
    pub pressed_lanes: Vec<Lane>,
    pub media: Option<SyncPhase>,
}

/// One play-through of a chart. All engine state lives here and is mutated
/// from a single thread.
pub struct Session<T: TimeSource> {
    config: EngineConfig,
    chart: Chart,
    time: T,
    clock: GameClock,
    timeline: Timeline,
    judge: Judge,
    notes: Vec<NoteState>,
    media: Option<MediaSyncController>,
    duration_ms: f64,
    aborted: bool,
}

impl<T: TimeSource> Session<T> {
    pub fn new(chart: Chart, config: EngineConfig, time: T) -> Self {
        let duration_ms = chart.session_duration_ms(
            config.timeline.tail_margin_ms,
            config.timeline.max_session_ms,
        );
        let notes = Self::note_states(&chart, &config);
        let media = chart
            .media
            .clone()
            .map(|track| MediaSyncController::new(track, config.sync));
        Self {
            clock: GameClock::new(),
            timeline: Timeline::new(config.timeline, config.miss_threshold_ms),
            judge: Judge::new(config.judgment, config.hold_release, config.feedback_display_ms),
            notes,
            media,
            duration_ms,
            aborted: false,
            chart,
            config,
            time,
        }
    }

    fn note_states(chart: &Chart, config: &EngineConfig) -> Vec<NoteState> {
        let base_fall = config.timeline.fall_duration_ms();
        chart
            .notes
            .iter()
            .map(|note| {
                let fall_ms = chart.tempo.fall_duration(note.time_ms, base_fall);
                NoteState::new(note.clone(), config.timeline.spawn_y, fall_ms)
            })
            .collect()
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn phase(&self) -> ClockPhase {
        self.clock.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.clock.phase() == ClockPhase::Ended
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.clock.elapsed_at(self.time.now_ms())
    }

    pub fn score(&self) -> Score {
        self.judge.score()
    }

    pub fn notes(&self) -> &[NoteState] {
        &self.notes
    }

    pub fn media(&self) -> Option<&MediaSyncController> {
        self.media.as_ref()
    }

    /// Hands a new player instance to the sync controller. Returns the
    /// generation its events must carry, or `None` when the chart has no media.
    pub fn attach_player(&mut self, player: Box<dyn MediaPlayer>) -> Option<Generation> {
        let now = self.time.now_ms();
        match self.media.as_mut() {
            Some(media) => Some(media.attach(player, now)),
            None => {
                debug!(chart = %self.chart.id, "chart has no media, player ignored");
                None
            }
        }
    }

    /// Starts (or restarts) the session with a fresh score and the pre-roll countdown.
    #[instrument(skip(self), fields(chart = %self.chart.id))]
    pub fn start(&mut self) {
        for warning in self.chart.tempo.warnings() {
            match warning {
                TempoWarning::Overlap {
                    earlier_start_ms,
                    later_start_ms,
                } => warn!(
                    earlier_start_ms,
                    later_start_ms, "tempo segments overlap, later segment wins"
                ),
                TempoWarning::NonPositiveBpm { start_ms, bpm } => {
                    warn!(start_ms, bpm, "non-positive tempo segment ignored for fall speed")
                }
                TempoWarning::EmptySpan { start_ms } => {
                    warn!(start_ms, "tempo segment ends before it starts")
                }
            }
        }
        self.notes = Self::note_states(&self.chart, &self.config);
        self.judge.reset();
        self.aborted = false;
        if let Some(media) = self.media.as_mut() {
            media.reset_session_state();
        }
        let now = self.time.now_ms();
        self.clock.start(now, self.config.timeline.pre_roll_ms);
        info!(
            notes = self.notes.len(),
            duration_ms = self.duration_ms,
            pre_roll_ms = self.config.timeline.pre_roll_ms,
            "session started"
        );
    }

    pub fn pause(&mut self) {
        if !self.clock.is_running() {
            return;
        }
        self.clock.pause(self.time.now_ms());
        if let Some(media) = self.media.as_mut() {
            media.pause();
        }
        info!(elapsed_ms = self.elapsed_ms(), "session paused");
    }

    pub fn resume(&mut self) {
        if self.clock.phase() != ClockPhase::Paused {
            return;
        }
        self.clock.resume(self.time.now_ms());
        if let Some(media) = self.media.as_mut() {
            media.resume();
        }
        info!(elapsed_ms = self.elapsed_ms(), "session resumed");
    }

    /// Stops the session early and releases the player.
    pub fn abort(&mut self) {
        if self.is_finished() {
            return;
        }
        self.aborted = true;
        self.clock.end(self.time.now_ms());
        if let Some(media) = self.media.as_mut() {
            media.teardown();
        }
        info!(elapsed_ms = self.elapsed_ms(), "session aborted");
    }

    /// Advances the session to the current time.
    pub fn tick(&mut self) -> TickReport {
        let now = self.time.now_ms();
        let elapsed_ms = self.clock.elapsed_at(now);
        if !self.clock.is_running() {
            return TickReport {
                elapsed_ms,
                misses: Vec::new(),
                sync: None,
                ended: self.is_finished(),
            };
        }

        let misses = self
            .timeline
            .advance(elapsed_ms, &mut self.notes, &mut self.judge);
        self.judge.expire_feedback(elapsed_ms);
        let sync = self
            .media
            .as_mut()
            .map(|media| media.sync(elapsed_ms, now));

        let ended = elapsed_ms >= self.duration_ms;
        if ended {
            self.finish(now);
        }
        TickReport {
            elapsed_ms,
            misses,
            sync,
            ended,
        }
    }

    fn finish(&mut self, now_ms: f64) {
        self.clock.end(now_ms);
        if let Some(media) = self.media.as_mut() {
            media.pause();
        }
        let score = self.judge.score();
        info!(
            chart = %self.chart.id,
            perfect = score.perfect,
            great = score.great,
            good = score.good,
            miss = score.miss,
            max_combo = score.max_combo,
            "session ended"
        );
    }

    pub fn handle_press(&mut self, lane: Lane) -> Option<Resolution> {
        let now = self.time.now_ms();
        self.handle_press_at(lane, now)
    }

    /// Judges a press that arrived at clock time `at_ms`.
    pub fn handle_press_at(&mut self, lane: Lane, at_ms: f64) -> Option<Resolution> {
        if !self.clock.is_running() {
            return None;
        }
        let elapsed = self.clock.elapsed_at(at_ms);
        if elapsed < 0.0 || elapsed >= self.duration_ms {
            return None;
        }
        self.judge.press(lane, elapsed, &mut self.notes)
    }

    pub fn handle_release(&mut self, lane: Lane) -> Vec<Resolution> {
        let now = self.time.now_ms();
        self.handle_release_at(lane, now)
    }

    pub fn handle_release_at(&mut self, lane: Lane, at_ms: f64) -> Vec<Resolution> {
        if !self.clock.is_running() {
            return Vec::new();
        }
        let elapsed = self.clock.elapsed_at(at_ms);
        self.judge.release(lane, elapsed, &mut self.notes)
    }

    pub fn handle_player_event(&mut self, event: PlayerEvent) -> bool {
        let now = self.time.now_ms();
        match self.media.as_mut() {
            Some(media) => media.handle_event(event, now),
            None => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let score = self.judge.score();
        SessionSnapshot {
            phase: self.clock.phase(),
            elapsed_ms: self.elapsed_ms(),
            duration_ms: self.duration_ms,
            notes: self
                .notes
                .iter()
                .map(|state| NoteView {
                    id: state.note.id,
                    lane: state.note.lane,
                    kind: state.note.kind,
                    y: state.y,
                    hit: state.hit,
                    held: self.judge.is_held(state.note.id),
                })
                .collect(),
            score,
            accuracy: score.accuracy(&self.config.weights),
            feedback: self.judge.feedback(),
            pressed_lanes: self.judge.pressed_lanes(),
            media: self.media.as_ref().map(|media| media.phase()),
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::new(
            self.chart.id.clone(),
            self.judge.score(),
            &self.config.weights,
            self.notes.len(),
            self.aborted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitline_domain::{Judgment, ManualClock, MediaTrack, Note, TempoMap, TempoSegment};
    use hitline_media::{PlayerCommand, PlayerState, ScriptedPlayer};

    fn lane(index: u8) -> Lane {
        Lane::new(index).unwrap()
    }

    fn chart() -> Chart {
        Chart::new(
            "test",
            "Test",
            TempoMap::constant(120.0),
            vec![
                Note::tap(1, lane(0), 1000.0),
                Note::tap(2, lane(1), 2000.0),
                Note::hold(3, lane(2), 3000.0, 4000.0),
            ],
        )
    }

    fn started(chart: Chart) -> (Session<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut session = Session::new(chart, EngineConfig::default(), clock.clone());
        session.start();
        (session, clock)
    }

    #[test]
    fn duration_covers_last_note_plus_tail() {
        let (session, _) = started(chart());
        assert_eq!(session.duration_ms(), 9000.0);
    }

    #[test]
    fn presses_during_pre_roll_are_ignored() {
        let (mut session, clock) = started(chart());
        clock.set(4000.0 - 10.0);
        assert!(session.handle_press(lane(0)).is_none());
        assert_eq!(session.score().total_judged(), 0);
        clock.set(5000.0);
        let hit = session.handle_press(lane(0)).unwrap();
        assert_eq!(hit.judgment, Judgment::Perfect);
    }

    #[test]
    fn press_uses_arrival_time() {
        let (mut session, clock) = started(chart());
        clock.set(6100.0);
        // arrived at elapsed 2000 but delivered late
        let hit = session.handle_press_at(lane(1), 6000.0).unwrap();
        assert_eq!(hit.judgment, Judgment::Perfect);
    }

    #[test]
    fn full_playthrough_scores_and_ends() {
        let (mut session, clock) = started(chart());
        clock.set(4000.0 + 1000.0);
        session.tick();
        session.handle_press(lane(0));
        clock.set(4000.0 + 3000.0);
        session.tick();
        assert_eq!(session.score().miss, 1);
        session.handle_press(lane(2));
        clock.set(4000.0 + 4000.0);
        session.tick();
        let released = session.handle_release(lane(2));
        assert_eq!(released[0].judgment, Judgment::Perfect);

        clock.set(4000.0 + 9000.0);
        let report = session.tick();
        assert!(report.ended);
        assert!(session.is_finished());

        let snapshot = session.snapshot();
        assert!(snapshot.notes.iter().all(|n| n.hit));
        assert_eq!(snapshot.score.perfect, 3);
        assert_eq!(snapshot.score.max_combo, 2);

        let summary = session.report();
        assert_eq!(summary.notes_total, 3);
        assert!(!summary.aborted);
        assert!(session.handle_press(lane(0)).is_none());
    }

    #[test]
    fn pause_stops_time_for_judging() {
        let (mut session, clock) = started(chart());
        clock.set(4500.0);
        session.pause();
        clock.set(60_000.0);
        let report = session.tick();
        assert!(report.misses.is_empty());
        assert_eq!(report.elapsed_ms, 500.0);
        session.resume();
        clock.set(60_500.0);
        assert_eq!(session.handle_press(lane(0)).unwrap().judgment, Judgment::Perfect);
    }

    #[test]
    fn abort_marks_report() {
        let (mut session, clock) = started(chart());
        clock.set(5000.0);
        session.abort();
        assert!(session.is_finished());
        assert!(session.report().aborted);
    }

    #[test]
    fn abort_pauses_and_releases_the_player() {
        let chart = chart().with_media(MediaTrack::new("video"));
        let clock = ManualClock::new();
        let mut session = Session::new(chart, EngineConfig::default(), clock.clone());
        let player = ScriptedPlayer::new();
        let generation = session.attach_player(Box::new(player.clone())).unwrap();
        assert!(session.handle_player_event(PlayerEvent::ready(generation)));
        session.start();
        clock.set(5000.0);
        assert!(matches!(session.tick().sync, Some(SyncAction::Started { .. })));

        session.abort();
        assert_eq!(player.commands().last(), Some(&PlayerCommand::Pause));
        assert_eq!(session.media().map(|m| m.phase()), Some(SyncPhase::TornDown));

        player.clear();
        clock.set(6000.0);
        session.tick();
        assert!(!session.handle_player_event(PlayerEvent::state_change(
            generation,
            PlayerState::Playing
        )));
        assert!(player.commands().is_empty());
    }

    #[test]
    fn tempo_segments_shorten_fall_duration() {
        let chart = Chart::new(
            "tempo",
            "Tempo",
            TempoMap::new(120.0, vec![TempoSegment::new(1000.0, None, 240.0)]),
            vec![Note::tap(1, lane(0), 500.0), Note::tap(2, lane(0), 1500.0)],
        );
        let (session, _) = started(chart);
        assert_eq!(session.notes()[0].fall_ms, 2000.0);
        assert_eq!(session.notes()[1].fall_ms, 1000.0);
    }

    #[test]
    fn media_follows_the_session() {
        let chart = chart().with_media(MediaTrack::new("video"));
        let clock = ManualClock::new();
        let mut session = Session::new(chart, EngineConfig::default(), clock.clone());
        let player = ScriptedPlayer::new();
        let generation = session.attach_player(Box::new(player.clone())).unwrap();
        assert!(session.handle_player_event(PlayerEvent::ready(generation)));
        session.start();
        player.clear();

        clock.set(1000.0);
        assert_eq!(session.tick().sync, Some(SyncAction::Cued { seconds: 0.0 }));
        clock.set(2000.0);
        assert_eq!(session.tick().sync, Some(SyncAction::Idle));
        clock.set(4000.0);
        assert!(matches!(session.tick().sync, Some(SyncAction::Started { .. })));
        assert!(player.commands().contains(&PlayerCommand::Play));

        clock.set(4000.0 + 9000.0);
        player.set_position(9.0);
        session.tick();
        assert_eq!(player.commands().last(), Some(&PlayerCommand::Pause));
        assert!(!session.handle_player_event(PlayerEvent::ready(Generation(99))));
    }
}
