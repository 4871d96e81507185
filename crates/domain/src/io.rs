use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chart::{Chart, MediaTrack};
use crate::error::DomainError;
use crate::note::{Lane, Note, NoteKind, MIN_HOLD_DURATION_MS};
use crate::tempo::{TempoMap, TempoSegment};

const DEFAULT_BPM: f64 = 120.0;

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

/// One note as stored in a chart file. Runtime fields (`y`, `hit`) are ignored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    #[serde(default)]
    pub id: Option<u32>,
    pub lane: i64,
    pub time: f64,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// On-disk chart layout, shared with the authoring tools.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub notes: Vec<NoteRecord>,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default)]
    pub youtube_video_id: Option<String>,
    #[serde(default)]
    pub speed_changes: Vec<TempoSegment>,
    #[serde(default)]
    pub chart_title: Option<String>,
    #[serde(default)]
    pub chart_author: Option<String>,
    #[serde(default)]
    pub playback_speed: Option<f64>,
    #[serde(default)]
    pub start_time_ms: Option<f64>,
    #[serde(default)]
    pub audio_offset_ms: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { chart: ChartFile },
    Bare(ChartFile),
}

#[derive(Serialize)]
struct WrappedRef<'a> {
    chart: &'a ChartFile,
}

/// What normalization changed while loading.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizationReport {
    pub kept: usize,
    pub dropped: usize,
    pub converted_to_tap: usize,
}

/// Validates raw records into playable notes, sorted by time.
pub fn normalize_notes(records: &[NoteRecord]) -> (Vec<Note>, NormalizationReport) {
    let mut report = NormalizationReport::default();
    let mut notes = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let id = record.id.unwrap_or(index as u32 + 1);
        let lane = match u8::try_from(record.lane).ok().map(Lane::new) {
            Some(Ok(lane)) => lane,
            _ => {
                debug!(id, lane = record.lane, "dropping note with invalid lane");
                report.dropped += 1;
                continue;
            }
        };
        if !record.time.is_finite() || record.time < 0.0 {
            debug!(id, time = record.time, "dropping note with invalid time");
            report.dropped += 1;
            continue;
        }
        let duration = record
            .duration
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);
        let end_time = record
            .end_time
            .filter(|t| t.is_finite())
            .unwrap_or(record.time);
        let wants_hold = record.kind.as_deref() == Some("hold") || duration > 0.0;
        if !wants_hold {
            notes.push(Note::tap(id, lane, record.time));
            continue;
        }
        if duration <= 0.0 || end_time <= record.time || duration < MIN_HOLD_DURATION_MS {
            report.converted_to_tap += 1;
            notes.push(Note::tap(id, lane, record.time));
        } else {
            notes.push(Note::hold(id, lane, record.time, record.time + duration));
        }
    }
    notes.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    report.kept = notes.len();
    (notes, report)
}

impl ChartFile {
    pub fn into_chart(self, fallback_id: &str) -> (Chart, NormalizationReport) {
        let (notes, report) = normalize_notes(&self.notes);
        let id = self.id.unwrap_or_else(|| fallback_id.to_string());
        let title = self.chart_title.unwrap_or_else(|| id.clone());
        let mut chart = Chart::new(id, title, TempoMap::new(self.bpm, self.speed_changes), notes);
        chart.author = self.chart_author;
        chart.media = self.youtube_video_id.map(|video_id| MediaTrack {
            start_time_ms: self.start_time_ms.unwrap_or(0.0),
            audio_offset_ms: self.audio_offset_ms.unwrap_or(0.0),
            playback_rate: self.playback_speed.unwrap_or(1.0),
            ..MediaTrack::new(video_id)
        });
        (chart, report)
    }

    pub fn from_chart(chart: &Chart) -> Self {
        let notes = chart
            .notes
            .iter()
            .map(|note| NoteRecord {
                id: Some(note.id.0),
                lane: note.lane.index() as i64,
                time: note.time_ms,
                duration: Some(note.duration_ms()),
                end_time: Some(note.end_time_ms),
                kind: Some(match note.kind {
                    NoteKind::Tap => "tap".to_string(),
                    NoteKind::Hold => "hold".to_string(),
                }),
            })
            .collect();
        Self {
            id: Some(chart.id.clone()),
            notes,
            bpm: chart.tempo.base_bpm(),
            youtube_video_id: chart.media.as_ref().map(|m| m.video_id.clone()),
            speed_changes: chart.tempo.segments().to_vec(),
            chart_title: Some(chart.title.clone()),
            chart_author: chart.author.clone(),
            playback_speed: chart.media.as_ref().map(|m| m.playback_rate),
            start_time_ms: chart.media.as_ref().map(|m| m.start_time_ms),
            audio_offset_ms: chart.media.as_ref().map(|m| m.audio_offset_ms),
        }
    }
}

/// Parses a chart document, with or without the `{"chart": ...}` envelope.
pub fn parse_chart(
    json: &str,
    fallback_id: &str,
) -> Result<(Chart, NormalizationReport), DomainError> {
    let file = match serde_json::from_str::<Envelope>(json)? {
        Envelope::Wrapped { chart } => chart,
        Envelope::Bare(chart) => chart,
    };
    Ok(file.into_chart(fallback_id))
}

pub trait ChartExporter {
    fn export(&self, chart: &Chart) -> Result<Vec<u8>, DomainError>;
}

pub struct JsonExporter;

impl ChartExporter for JsonExporter {
    fn export(&self, chart: &Chart) -> Result<Vec<u8>, DomainError> {
        let file = ChartFile::from_chart(chart);
        Ok(serde_json::to_vec_pretty(&WrappedRef { chart: &file })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORED: &str = r#"{
        "chart": {
            "notes": [
                {"id": 4, "lane": 1, "time": 1500, "duration": 0, "endTime": 1500,
                 "type": "tap", "y": 0, "hit": true},
                {"id": 2, "lane": 0, "time": 1000, "duration": 800, "endTime": 1800,
                 "type": "hold"},
                {"id": 3, "lane": 2, "time": 1200, "duration": 20, "endTime": 1220, "type": "hold"},
                {"id": 5, "lane": 7, "time": 1300},
                {"id": 6, "lane": 3, "time": -10}
            ],
            "bpm": 140,
            "youtubeVideoId": "dQw4w9WgXcQ",
            "speedChanges": [{"id": 0, "startTimeMs": 2000, "endTimeMs": null, "bpm": 280}],
            "chartTitle": "Sample",
            "playbackSpeed": 1
        }
    }"#;

    #[test]
    fn parses_wrapped_chart_and_normalizes() {
        let (chart, report) = parse_chart(AUTHORED, "sample").unwrap();
        assert_eq!(report.dropped, 2);
        assert_eq!(report.converted_to_tap, 1);
        assert_eq!(report.kept, 3);
        assert_eq!(chart.id, "sample");
        assert_eq!(chart.title, "Sample");
        assert_eq!(chart.tempo.base_bpm(), 140.0);
        assert_eq!(chart.tempo.effective_bpm(2500.0), 280.0);
        assert_eq!(chart.notes[0].kind, NoteKind::Hold);
        assert_eq!(chart.notes[0].end_time_ms, 1800.0);
        assert_eq!(chart.notes[1].kind, NoteKind::Tap);
        assert_eq!(chart.media.as_ref().unwrap().video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_bare_chart_with_defaults() {
        let (chart, _) = parse_chart(r#"{"notes": [{"lane": 0, "time": 10}]}"#, "bare").unwrap();
        assert_eq!(chart.tempo.base_bpm(), DEFAULT_BPM);
        assert!(chart.media.is_none());
        assert_eq!(chart.notes.len(), 1);
    }

    #[test]
    fn rejects_documents_without_notes() {
        assert!(parse_chart(r#"{"bpm": 120}"#, "x").is_err());
        assert!(parse_chart("not json", "x").is_err());
    }

    #[test]
    fn exports_wrapped_json() {
        let (chart, _) = parse_chart(AUTHORED, "sample").unwrap();
        let bytes = JsonExporter.export(&chart).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"chart\""));
        assert!(output.contains("\"chartTitle\": \"Sample\""));
        let (reloaded, report) = parse_chart(&output, "other").unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(reloaded.notes, chart.notes);
    }
}
