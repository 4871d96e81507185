use std::collections::VecDeque;

use hitline_domain::{Judgment, Lane};
use serde::{Deserialize, Serialize};

/// Transient judgment popup for the render layer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub id: u64,
    pub judgment: Judgment,
    pub lane: Lane,
    pub created_at_ms: f64,
}

/// Feedback entries that drop themselves after `display_ms`.
#[derive(Clone, Debug)]
pub struct FeedbackQueue {
    display_ms: f64,
    next_id: u64,
    entries: VecDeque<FeedbackEvent>,
}

impl FeedbackQueue {
    pub fn new(display_ms: f64) -> Self {
        Self {
            display_ms,
            next_id: 0,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, judgment: Judgment, lane: Lane, now_ms: f64) -> FeedbackEvent {
        self.next_id += 1;
        let event = FeedbackEvent {
            id: self.next_id,
            judgment,
            lane,
            created_at_ms: now_ms,
        };
        self.entries.push_back(event);
        event
    }

    /// Drops entries older than the display duration.
    pub fn expire(&mut self, now_ms: f64) {
        while let Some(front) = self.entries.front() {
            if now_ms - front.created_at_ms >= self.display_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn active(&self) -> Vec<FeedbackEvent> {
        self.entries.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
