//! Feedback events and the training examples derived from them.
//!
//! A [`FeedbackEvent`] is one seeker's approve/reject signal about one candidate.
//! The upstream direction vocabulary is opaque: exactly one literal (see
//! [`DEFAULT_APPROVE_DIRECTION`]) means approve, everything else is a rejection.


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEFAULT_APPROVE_DIRECTION;
use crate::index::VocabularyIndex;

/// A single approve/reject signal. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    #[serde(alias = "swiper_id")]
    pub seeker_id: String,
    #[serde(alias = "swiped_id")]
    pub candidate_id: String,
    pub direction: String,
}

impl FeedbackEvent {
    pub fn new(
        seeker_id: impl Into<String>,
        candidate_id: impl Into<String>,
        direction: impl Into<String>,
    ) -> Self {
        Self {
            seeker_id: seeker_id.into(),
            candidate_id: candidate_id.into(),
            direction: direction.into(),
        }
    }

    /// Event carrying the default approve literal.
    pub fn approve(seeker_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self::new(seeker_id, candidate_id, DEFAULT_APPROVE_DIRECTION)
    }

    /// Event carrying the default reject literal.
    pub fn reject(seeker_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self::new(
            seeker_id,
            candidate_id,
            crate::constants::DEFAULT_REJECT_DIRECTION,
        )
    }

    pub fn is_approval(&self, approve_direction: &str) -> bool {
        self.direction == approve_direction
    }

    /// `1.0` iff the direction is exactly `approve_direction`, else `0.0`.
    pub fn label(&self, approve_direction: &str) -> f32 {
        if self.is_approval(approve_direction) {
            1.0
        } else {
            0.0
        }
    }
}

/// `(seeker index, candidate index, label)` fed to the trainer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingExample {
    pub seeker_idx: u32,
    pub candidate_idx: u32,
    pub label: f32,
}

impl TrainingExample {
    pub fn new(seeker_idx: u32, candidate_idx: u32, label: f32) -> Self {
        Self {
            seeker_idx,
            candidate_idx,
            label,
        }
    }
}

/// Maps every event through `index`, dropping events whose seeker or candidate is unknown.
pub fn prepare_examples(
    events: &[FeedbackEvent],
    index: &VocabularyIndex,
    approve_direction: &str,
) -> Vec<TrainingExample> {
    let examples: Vec<TrainingExample> = events
        .iter()
        .filter_map(|event| {
            let seeker_idx = index.seekers().lookup(&event.seeker_id)?;
            let candidate_idx = index.candidates().lookup(&event.candidate_id)?;
            Some(TrainingExample::new(
                seeker_idx,
                candidate_idx,
                event.label(approve_direction),
            ))
        })
        .collect();

    let dropped = events.len() - examples.len();
    if dropped > 0 {
        debug!(dropped, kept = examples.len(), "Dropped unmapped feedback events");
    }

    examples
}
