use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A local tempo change. Open-ended when `end_time_ms` is absent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TempoSegment {
    pub start_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<f64>,
    pub bpm: f64,
}

impl TempoSegment {
    pub fn new(start_time_ms: f64, end_time_ms: Option<f64>, bpm: f64) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            bpm,
        }
    }

    pub fn is_active_at(&self, time_ms: f64) -> bool {
        self.start_time_ms <= time_ms && self.end_time_ms.map_or(true, |end| time_ms < end)
    }

    pub fn shifted(&self, delta_ms: f64) -> Self {
        Self {
            start_time_ms: self.start_time_ms + delta_ms,
            end_time_ms: self.end_time_ms.map(|end| end + delta_ms),
            bpm: self.bpm,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum TempoWarning {
    /// An explicitly bounded segment runs past the start of a later one.
    Overlap { earlier_start_ms: f64, later_start_ms: f64 },
    NonPositiveBpm { start_ms: f64, bpm: f64 },
    EmptySpan { start_ms: f64 },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct RawTempoMap {
    base_bpm: f64,
    #[serde(default)]
    segments: Vec<TempoSegment>,
}

/// Base tempo plus tempo-change segments sorted by start time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawTempoMap", into = "RawTempoMap")]
pub struct TempoMap {
    base_bpm: f64,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn new(base_bpm: f64, segments: Vec<TempoSegment>) -> Self {
        let mut sorted = segments;
        sorted.sort_by(|a, b| a.start_time_ms.total_cmp(&b.start_time_ms));
        Self {
            base_bpm,
            segments: sorted,
        }
    }

    pub fn constant(bpm: f64) -> Self {
        Self::new(bpm, Vec::new())
    }

    pub fn base_bpm(&self) -> f64 {
        self.base_bpm
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// Last segment in start order that covers `time_ms`, else the base tempo.
    /// Overlapping segments resolve to the later-starting one.
    pub fn effective_bpm(&self, time_ms: f64) -> f64 {
        let mut bpm = self.base_bpm;
        for segment in &self.segments {
            if segment.start_time_ms > time_ms {
                break;
            }
            if segment.is_active_at(time_ms) {
                bpm = segment.bpm;
            }
        }
        bpm
    }

    /// How many times faster than the base tempo the chart runs at `time_ms`.
    pub fn speed_multiplier(&self, time_ms: f64) -> f64 {
        if self.base_bpm <= 0.0 {
            return 1.0;
        }
        self.effective_bpm(time_ms) / self.base_bpm
    }

    /// Scales the fall duration so the same number of beats stays visible.
    pub fn fall_duration(&self, note_time_ms: f64, base_fall_duration_ms: f64) -> f64 {
        if self.base_bpm <= 0.0 || base_fall_duration_ms <= 0.0 {
            return base_fall_duration_ms;
        }
        let bpm = self.effective_bpm(note_time_ms);
        if bpm <= 0.0 || !bpm.is_finite() {
            return base_fall_duration_ms;
        }
        base_fall_duration_ms * (self.base_bpm / bpm)
    }

    pub fn warnings(&self) -> Vec<TempoWarning> {
        let mut warnings = Vec::new();
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.bpm <= 0.0 {
                warnings.push(TempoWarning::NonPositiveBpm {
                    start_ms: segment.start_time_ms,
                    bpm: segment.bpm,
                });
            }
            let Some(end) = segment.end_time_ms else {
                continue;
            };
            if end.partial_cmp(&segment.start_time_ms) != Some(Ordering::Greater) {
                warnings.push(TempoWarning::EmptySpan {
                    start_ms: segment.start_time_ms,
                });
                continue;
            }
            for later in &self.segments[index + 1..] {
                if later.start_time_ms >= end {
                    break;
                }
                warnings.push(TempoWarning::Overlap {
                    earlier_start_ms: segment.start_time_ms,
                    later_start_ms: later.start_time_ms,
                });
            }
        }
        warnings
    }
}

pub fn effective_tempo(time_ms: f64, base_bpm: f64, segments: &[TempoSegment]) -> f64 {
    TempoMap::new(base_bpm, segments.to_vec()).effective_bpm(time_ms)
}

pub fn fall_duration(
    note_time_ms: f64,
    base_bpm: f64,
    segments: &[TempoSegment],
    base_fall_duration_ms: f64,
) -> f64 {
    TempoMap::new(base_bpm, segments.to_vec()).fall_duration(note_time_ms, base_fall_duration_ms)
}

impl From<RawTempoMap> for TempoMap {
    fn from(raw: RawTempoMap) -> Self {
        TempoMap::new(raw.base_bpm, raw.segments)
    }
}

impl From<TempoMap> for RawTempoMap {
    fn from(map: TempoMap) -> Self {
        Self {
            base_bpm: map.base_bpm,
            segments: map.segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_step() -> Vec<TempoSegment> {
        vec![
            TempoSegment::new(1000.0, None, 240.0),
            TempoSegment::new(0.0, Some(1000.0), 120.0),
        ]
    }

    #[test]
    fn effective_tempo_follows_segments() {
        assert_eq!(effective_tempo(500.0, 120.0, &two_step()), 120.0);
        assert_eq!(effective_tempo(1500.0, 120.0, &two_step()), 240.0);
    }

    #[test]
    fn gaps_fall_back_to_base() {
        let segments = vec![
            TempoSegment::new(1000.0, Some(2000.0), 180.0),
            TempoSegment::new(3000.0, Some(4000.0), 90.0),
        ];
        let map = TempoMap::new(150.0, segments);
        assert_eq!(map.effective_bpm(500.0), 150.0);
        assert_eq!(map.effective_bpm(2500.0), 150.0);
        assert_eq!(map.effective_bpm(3500.0), 90.0);
        assert_eq!(map.effective_bpm(4000.0), 150.0);
    }

    #[test]
    fn overlaps_resolve_to_later_start_and_warn() {
        let map = TempoMap::new(
            120.0,
            vec![
                TempoSegment::new(1500.0, Some(2500.0), 200.0),
                TempoSegment::new(1000.0, Some(3000.0), 60.0),
            ],
        );
        assert_eq!(map.effective_bpm(1200.0), 60.0);
        assert_eq!(map.effective_bpm(2000.0), 200.0);
        assert_eq!(map.effective_bpm(2700.0), 60.0);
        assert_eq!(
            map.warnings(),
            vec![TempoWarning::Overlap {
                earlier_start_ms: 1000.0,
                later_start_ms: 1500.0
            }]
        );
    }

    #[test]
    fn fall_duration_identity_without_changes() {
        for t in [0.0, 250.0, 10_000.0] {
            assert_eq!(fall_duration(t, 120.0, &[], 2000.0), 2000.0);
        }
    }

    #[test]
    fn faster_tempo_shortens_fall() {
        assert_relative_eq!(fall_duration(1500.0, 120.0, &two_step(), 2000.0), 1000.0);
        let map = TempoMap::new(120.0, two_step());
        assert_relative_eq!(map.speed_multiplier(1500.0), 2.0);
    }

    #[test]
    fn non_positive_tempo_keeps_base_fall() {
        assert_eq!(fall_duration(0.0, 0.0, &two_step(), 2000.0), 2000.0);
        let zero = vec![TempoSegment::new(0.0, None, 0.0)];
        assert_eq!(fall_duration(10.0, 120.0, &zero, 2000.0), 2000.0);
        assert_eq!(TempoMap::constant(-5.0).speed_multiplier(0.0), 1.0);
    }

    #[test]
    fn deserialized_map_sorts_segments() {
        let json = r#"{"base_bpm":120,"segments":[
            {"startTimeMs":1000,"bpm":240},
            {"startTimeMs":0,"bpm":60}
        ]}"#;
        let loaded: TempoMap = serde_json::from_str(json).unwrap();
        let built = TempoMap::new(
            120.0,
            vec![
                TempoSegment::new(1000.0, None, 240.0),
                TempoSegment::new(0.0, None, 60.0),
            ],
        );
        assert_eq!(loaded, built);
        assert_eq!(loaded.effective_bpm(500.0), 60.0);
        assert_eq!(loaded.effective_bpm(1500.0), 240.0);
    }

    #[test]
    fn segment_serializes_camel_case() {
        let json = serde_json::to_string(&TempoSegment::new(0.0, Some(10.0), 90.0)).unwrap();
        assert!(json.contains("\"startTimeMs\""));
        let open: TempoSegment =
            serde_json::from_str(r#"{"startTimeMs":5,"endTimeMs":null,"bpm":100}"#).unwrap();
        assert_eq!(open.end_time_ms, None);
    }
}
