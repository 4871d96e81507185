use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::judgment::Judgment;

/// Points awarded per judgment, used for accuracy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct JudgmentWeights {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    pub miss: f64,
}

impl JudgmentWeights {
    pub fn weight(&self, judgment: Judgment) -> f64 {
        match judgment {
            Judgment::Perfect => self.perfect,
            Judgment::Great => self.great,
            Judgment::Good => self.good,
            Judgment::Miss => self.miss,
        }
    }
}

impl Default for JudgmentWeights {
    fn default() -> Self {
        Self {
            perfect: 100.0,
            great: 80.0,
            good: 50.0,
            miss: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
    pub combo: u32,
    pub max_combo: u32,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `judgment`; any miss drops the combo to zero.
    pub fn record(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect += 1,
            Judgment::Great => self.great += 1,
            Judgment::Good => self.good += 1,
            Judgment::Miss => self.miss += 1,
        }
        if judgment.is_miss() {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }
    }

    pub fn total_judged(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }

    /// Weighted accuracy in percent, 0 when nothing was judged.
    pub fn accuracy(&self, weights: &JudgmentWeights) -> f64 {
        let total = self.total_judged();
        if total == 0 || weights.perfect <= 0.0 {
            return 0.0;
        }
        let earned = weights.perfect * self.perfect as f64
            + weights.great * self.great as f64
            + weights.good * self.good as f64
            + weights.miss * self.miss as f64;
        earned / (total as f64 * weights.perfect) * 100.0
    }
}

/// Final result of a session, opaque to the engine once produced.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub chart_id: String,
    pub score: Score,
    pub accuracy: f64,
    pub notes_total: usize,
    pub aborted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl SessionReport {
    pub fn new(
        chart_id: impl Into<String>,
        score: Score,
        weights: &JudgmentWeights,
        notes_total: usize,
        aborted: bool,
    ) -> Self {
        Self {
            chart_id: chart_id.into(),
            accuracy: score.accuracy(weights),
            score,
            notes_total,
            aborted,
            finished_at: OffsetDateTime::now_utc(),
        }
    }
}
