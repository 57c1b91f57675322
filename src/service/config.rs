use std::path::PathBuf;

use crate::constants::{
    DEFAULT_APPROVE_DIRECTION, DEFAULT_CHECKPOINT_FILENAME, DEFAULT_DROPOUT, DEFAULT_TOP_K,
    MIN_TRAINING_EVENTS, ModelDims,
};
use crate::training::TrainerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Where the checkpoint is written after training and read at startup.
    pub checkpoint_path: PathBuf,
    /// Direction literal that counts as an approval.
    pub approve_direction: String,
    /// Optimizer and batching settings. `epochs` is the default used by the training job.
    pub trainer: TrainerConfig,
    /// Architecture of freshly trained models.
    pub dims: ModelDims,
    pub dropout: f32,
    /// Minimum raw events and derived examples required to train.
    pub min_training_events: usize,
    /// Ranking length used by `recommend_default`.
    pub top_k: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("./.data").join(DEFAULT_CHECKPOINT_FILENAME),
            approve_direction: DEFAULT_APPROVE_DIRECTION.to_string(),
            trainer: TrainerConfig::default(),
            dims: ModelDims::default(),
            dropout: DEFAULT_DROPOUT,
            min_training_events: MIN_TRAINING_EVENTS,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ServiceConfig {
    pub fn new<P: Into<PathBuf>>(checkpoint_path: P) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            ..Default::default()
        }
    }

    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn with_dims(mut self, dims: ModelDims) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_approve_direction(mut self, approve_direction: impl Into<String>) -> Self {
        self.approve_direction = approve_direction.into();
        self
    }
}
