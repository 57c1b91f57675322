use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::model::ModelError;
use crate::training::TrainingError;

/// Failures that abort a training run. The previously installed model is kept.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
