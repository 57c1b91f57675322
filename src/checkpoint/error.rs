use std::path::PathBuf;
use thiserror::Error;

use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint not found at {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt checkpoint: {reason}")]
    Corrupt { reason: String },

    #[error("unsupported checkpoint version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("inconsistent checkpoint: {reason}")]
    Inconsistent { reason: String },

    #[error("checkpoint weights incompatible with architecture: {0}")]
    Incompatible(#[from] ModelError),
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
