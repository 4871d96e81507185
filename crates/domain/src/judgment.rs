use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Judgment {
    pub fn is_miss(self) -> bool {
        self == Judgment::Miss
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Judgment::Perfect => "perfect",
            Judgment::Great => "great",
            Judgment::Good => "good",
            Judgment::Miss => "miss",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
struct RawWindows {
    perfect: f64,
    great: f64,
    good: f64,
}

/// Symmetric timing radii in milliseconds, `perfect < great < good`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawWindows", into = "RawWindows")]
pub struct JudgmentWindows {
    perfect: f64,
    great: f64,
    good: f64,
}

impl JudgmentWindows {
    pub fn new(perfect: f64, great: f64, good: f64) -> Result<Self, DomainError> {
        if ![perfect, great, good].iter().all(|w| w.is_finite() && *w >= 0.0) {
            return Err(DomainError::validation(
                "judgment windows must be finite and non-negative",
            ));
        }
        if !(perfect < great && great < good) {
            return Err(DomainError::validation(format!(
                "judgment windows must be strictly increasing, got {perfect}/{great}/{good}"
            )));
        }
        Ok(Self {
            perfect,
            great,
            good,
        })
    }

    pub fn perfect(&self) -> f64 {
        self.perfect
    }

    pub fn great(&self) -> f64 {
        self.great
    }

    /// The widest window; nothing outside it is judged as a hit.
    pub fn good(&self) -> f64 {
        self.good
    }

    /// Tap/press windows.
    pub fn standard() -> Self {
        Self {
            perfect: 45.0,
            great: 90.0,
            good: 135.0,
        }
    }

    /// Release windows for holds, a quarter wider than [`JudgmentWindows::standard`].
    pub fn hold_release() -> Self {
        Self {
            perfect: 56.0,
            great: 112.0,
            good: 168.0,
        }
    }
}

impl Default for JudgmentWindows {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<RawWindows> for JudgmentWindows {
    type Error = DomainError;

    fn try_from(raw: RawWindows) -> Result<Self, Self::Error> {
        JudgmentWindows::new(raw.perfect, raw.great, raw.good)
    }
}

impl From<JudgmentWindows> for RawWindows {
    fn from(windows: JudgmentWindows) -> Self {
        Self {
            perfect: windows.perfect,
            great: windows.great,
            good: windows.good,
        }
    }
}

/// Classifies a signed offset (scheduled minus actual) against `windows`.
pub fn judge(offset_ms: f64, windows: &JudgmentWindows) -> Judgment {
    let distance = offset_ms.abs();
    if distance <= windows.perfect {
        Judgment::Perfect
    } else if distance <= windows.great {
        Judgment::Great
    } else if distance <= windows.good {
        Judgment::Good
    } else {
        Judgment::Miss
    }
}
