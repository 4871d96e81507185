pub mod chart;
pub mod error;
pub mod generator;
pub mod io;
pub mod judgment;
pub mod note;
pub mod score;
pub mod tempo;
pub mod time_source;

pub use crate::chart::{Chart, MediaTrack};
pub use crate::error::DomainError;
pub use crate::generator::{generate_chart, MAX_GENERATED_MS};
pub use crate::io::{parse_chart, ChartExporter, ChartFile, JsonExporter, NormalizationReport};
pub use crate::judgment::{judge, Judgment, JudgmentWindows};
pub use crate::note::{Lane, Note, NoteId, NoteKind, LANE_COUNT};
pub use crate::score::{JudgmentWeights, Score, SessionReport};
pub use crate::tempo::{effective_tempo, fall_duration, TempoMap, TempoSegment, TempoWarning};
pub use crate::time_source::{ManualClock, SystemClock, TimeSource};
