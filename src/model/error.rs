use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("{kind} index {index} out of range for vocabulary of {len}")]
    IndexOutOfRange {
        kind: &'static str,
        index: u32,
        len: usize,
    },

    #[error("tensor operation failed: {reason}")]
    TensorFailed { reason: String },

    #[error("missing tensor '{name}' in stored weights")]
    MissingTensor { name: String },

    #[error("unexpected tensor '{name}' in stored weights")]
    UnexpectedTensor { name: String },

    #[error("tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("tensor '{name}' holds {actual} values, shape needs {expected}")]
    DataLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::TensorFailed {
            reason: err.to_string(),
        }
    }
}
