use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Number of parallel input tracks.
pub const LANE_COUNT: usize = 4;

/// Holds shorter than this are played as taps.
pub const MIN_HOLD_DURATION_MS: f64 = 50.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct Lane(u8);

impl Lane {
    pub fn new(index: u8) -> Result<Self, DomainError> {
        if (index as usize) < LANE_COUNT {
            Ok(Self(index))
        } else {
            Err(DomainError::validation(format!(
                "lane {index} out of range 0..{LANE_COUNT}"
            )))
        }
    }

    /// Maps any index onto a lane by wrapping around.
    pub fn wrapping(index: usize) -> Self {
        Self((index % LANE_COUNT) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Lane> {
        (0..LANE_COUNT as u8).map(Lane)
    }
}

impl TryFrom<u8> for Lane {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Lane::new(value)
    }
}

impl From<Lane> for u8 {
    fn from(lane: Lane) -> Self {
        lane.0
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane {}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NoteId(pub u32);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Tap,
    Hold,
}

/// One scheduled input event. Times are milliseconds from session start.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub lane: Lane,
    pub time_ms: f64,
    pub kind: NoteKind,
    /// Release time for holds, equal to `time_ms` for taps.
    pub end_time_ms: f64,
}

impl Note {
    pub fn tap(id: u32, lane: Lane, time_ms: f64) -> Self {
        Self {
            id: NoteId(id),
            lane,
            time_ms,
            kind: NoteKind::Tap,
            end_time_ms: time_ms,
        }
    }

    /// Builds a hold, falling back to a tap when the span is too short to hold.
    pub fn hold(id: u32, lane: Lane, time_ms: f64, end_time_ms: f64) -> Self {
        if end_time_ms - time_ms < MIN_HOLD_DURATION_MS {
            return Self::tap(id, lane, time_ms);
        }
        Self {
            id: NoteId(id),
            lane,
            time_ms,
            kind: NoteKind::Hold,
            end_time_ms,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.kind == NoteKind::Hold
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_time_ms - self.time_ms
    }

    /// The instant after which an unresolved note counts as missed.
    pub fn deadline_ms(&self) -> f64 {
        match self.kind {
            NoteKind::Tap => self.time_ms,
            NoteKind::Hold => self.end_time_ms,
        }
    }
}
