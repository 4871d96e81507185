use serde::{Deserialize, Serialize};

use crate::note::{Note, NoteId};
use crate::tempo::TempoMap;
use crate::DomainError;

/// Externally hosted media the chart is timed against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaTrack {
    pub video_id: String,
    /// Media position (ms) that lines up with chart time zero.
    pub start_time_ms: f64,
    /// Manual latency correction added to every media position.
    pub audio_offset_ms: f64,
    pub playback_rate: f64,
}

impl MediaTrack {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            start_time_ms: 0.0,
            audio_offset_ms: 0.0,
            playback_rate: 1.0,
        }
    }

    /// Where the player waits during pre-roll, in seconds.
    pub fn cue_seconds(&self) -> f64 {
        ((self.start_time_ms + self.audio_offset_ms) / 1000.0).max(0.0)
    }

    /// Where the player should be when the game clock reads `elapsed_ms`.
    pub fn position_seconds(&self, elapsed_ms: f64) -> f64 {
        let played = elapsed_ms.max(0.0) * self.rate();
        ((self.start_time_ms + self.audio_offset_ms + played) / 1000.0).max(0.0)
    }

    pub fn rate(&self) -> f64 {
        if self.playback_rate > 0.0 && self.playback_rate.is_finite() {
            self.playback_rate
        } else {
            1.0
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct RawChart {
    id: String,
    title: String,
    #[serde(default)]
    author: Option<String>,
    tempo: TempoMap,
    notes: Vec<Note>,
    #[serde(default)]
    media: Option<MediaTrack>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawChart", into = "RawChart")]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub tempo: TempoMap,
    pub notes: Vec<Note>,
    pub media: Option<MediaTrack>,
}

impl From<RawChart> for Chart {
    fn from(raw: RawChart) -> Self {
        let mut chart = Chart::new(raw.id, raw.title, raw.tempo, raw.notes);
        chart.author = raw.author;
        chart.media = raw.media;
        chart
    }
}

impl From<Chart> for RawChart {
    fn from(chart: Chart) -> Self {
        Self {
            id: chart.id,
            title: chart.title,
            author: chart.author,
            tempo: chart.tempo,
            notes: chart.notes,
            media: chart.media,
        }
    }
}

impl Chart {
    /// Sorts notes by time and renumbers them `1..=n`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        tempo: TempoMap,
        notes: Vec<Note>,
    ) -> Self {
        let mut notes = notes;
        notes.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms).then(a.lane.cmp(&b.lane)));
        for (index, note) in notes.iter_mut().enumerate() {
            note.id = NoteId(index as u32 + 1);
        }
        Self {
            id: id.into(),
            title: title.into(),
            author: None,
            tempo,
            notes,
            media: None,
        }
    }

    pub fn with_media(mut self, media: MediaTrack) -> Self {
        self.media = Some(media);
        self
    }

    pub fn last_note_end_ms(&self) -> f64 {
        self.notes
            .iter()
            .map(|note| note.end_time_ms)
            .fold(0.0, f64::max)
    }

    /// Session length: last note plus tail margin, capped at `max_ms`.
    pub fn session_duration_ms(&self, tail_margin_ms: f64, max_ms: f64) -> f64 {
        (self.last_note_end_ms() + tail_margin_ms).min(max_ms)
    }

    /// Re-bases the chart so that `start_ms` becomes time zero.
    ///
    /// Notes that end before `start_ms` are dropped and holds straddling it are
    /// trimmed. The media track is advanced by the same amount.
    pub fn starting_at(&self, start_ms: f64) -> Result<Chart, DomainError> {
        let start_ms = start_ms.max(0.0).floor();
        let notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|note| note.end_time_ms >= start_ms)
            .map(|note| {
                let adjusted_start = note.time_ms.max(start_ms);
                let remaining = (note.end_time_ms - adjusted_start).max(0.0);
                let relative_start = adjusted_start - start_ms;
                if note.is_hold() && remaining > 0.0 {
                    Note::hold(note.id.0, note.lane, relative_start, relative_start + remaining)
                } else {
                    Note::tap(note.id.0, note.lane, relative_start)
                }
            })
            .collect();
        if notes.is_empty() {
            return Err(DomainError::validation(format!(
                "no notes remain after {start_ms} ms"
            )));
        }
        let segments = self
            .tempo
            .segments()
            .iter()
            .map(|segment| segment.shifted(-start_ms))
            .collect();
        let mut chart = Chart::new(
            self.id.clone(),
            self.title.clone(),
            TempoMap::new(self.tempo.base_bpm(), segments),
            notes,
        );
        chart.author = self.author.clone();
        chart.media = self.media.as_ref().map(|media| MediaTrack {
            start_time_ms: media.start_time_ms + start_ms,
            ..media.clone()
        });
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{Lane, NoteKind};
    use crate::tempo::TempoSegment;

    fn lane(index: u8) -> Lane {
        Lane::new(index).unwrap()
    }

    fn sample() -> Chart {
        Chart::new(
            "id",
            "Chart",
            TempoMap::new(120.0, vec![TempoSegment::new(3000.0, None, 150.0)]),
            vec![
                Note::tap(9, lane(2), 2500.0),
                Note::tap(4, lane(0), 500.0),
                Note::hold(7, lane(1), 1000.0, 3000.0),
            ],
        )
        .with_media(MediaTrack::new("abc123"))
    }

    #[test]
    fn deserialized_chart_is_normalized() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["notes"].as_array_mut().unwrap().reverse();
        value["tempo"]["segments"] = serde_json::json!([
            {"startTimeMs": 2000.0, "bpm": 240.0},
            {"startTimeMs": 0.0, "bpm": 60.0}
        ]);
        let chart: Chart = serde_json::from_value(value).unwrap();
        let times: Vec<f64> = chart.notes.iter().map(|n| n.time_ms).collect();
        assert_eq!(times, vec![500.0, 1000.0, 2500.0]);
        assert_eq!(chart.tempo.effective_bpm(1000.0), 60.0);
        assert_eq!(chart.media, sample().media);
    }

    #[test]
    fn constructor_sorts_and_renumbers() {
        let chart = sample();
        let ids: Vec<u32> = chart.notes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(chart.notes[0].time_ms, 500.0);
        assert_eq!(chart.last_note_end_ms(), 3000.0);
        assert_eq!(chart.session_duration_ms(5000.0, 300_000.0), 8000.0);
        assert_eq!(chart.session_duration_ms(5000.0, 6000.0), 6000.0);
    }

    #[test]
    fn starting_at_trims_and_rebases() {
        let trimmed = sample().starting_at(2000.0).unwrap();
        assert_eq!(trimmed.notes.len(), 2);
        let hold = &trimmed.notes[0];
        assert_eq!(hold.kind, NoteKind::Hold);
        assert_eq!(hold.time_ms, 0.0);
        assert_eq!(hold.end_time_ms, 1000.0);
        assert_eq!(trimmed.notes[1].time_ms, 500.0);
        assert_eq!(trimmed.tempo.segments()[0].start_time_ms, 1000.0);
        assert_eq!(trimmed.media.as_ref().unwrap().start_time_ms, 2000.0);
    }

    #[test]
    fn starting_past_the_end_is_rejected() {
        assert!(sample().starting_at(10_000.0).is_err());
    }

    #[test]
    fn media_positions() {
        let mut media = MediaTrack::new("v");
        media.start_time_ms = 2000.0;
        media.audio_offset_ms = -500.0;
        assert_eq!(media.cue_seconds(), 1.5);
        assert_eq!(media.position_seconds(-4000.0), 1.5);
        assert_eq!(media.position_seconds(1000.0), 2.5);
        media.playback_rate = 2.0;
        assert_eq!(media.position_seconds(1000.0), 3.5);
        media.playback_rate = 0.0;
        assert_eq!(media.rate(), 1.0);
    }
}
