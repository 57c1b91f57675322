use thiserror::Error;

use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid trainer configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("optimization step failed: {reason}")]
    StepFailed { reason: String },

    #[error("loss diverged at epoch {epoch}: {loss}")]
    NonFiniteLoss { epoch: usize, loss: f32 },
}

impl From<candle_core::Error> for TrainingError {
    fn from(err: candle_core::Error) -> Self {
        TrainingError::StepFailed {
            reason: err.to_string(),
        }
    }
}
