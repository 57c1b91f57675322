use serde::{Deserialize, Serialize};

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub candidate_id: String,
    /// Approval probability in `[0, 1]`; exactly `0.5` when the model could not score it.
    pub score: f32,
}

impl Recommendation {
    pub fn new(candidate_id: impl Into<String>, score: f32) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientEvents { found: usize, required: usize },
    InsufficientExamples { found: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Trained {
        num_seekers: usize,
        num_candidates: usize,
        examples: usize,
        final_loss: Option<f32>,
        checkpoint_bytes: u64,
    },
    /// Nothing changed; the previous model (if any) is still installed.
    Skipped { reason: SkipReason },
}

impl TrainingOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainingOutcome::Trained { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded {
        num_seekers: usize,
        num_candidates: usize,
    },
    NotFound,
    /// The checkpoint was unreadable or incompatible; the service is now untrained.
    Failed { reason: String },
}
