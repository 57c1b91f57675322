//! Cross-cutting, shared constants.
//!
//! # Dimension Invariants
//!
//! The model architecture is fixed at construction time and recorded in every checkpoint.
//! If you need non-default dimensions:
//!
//! 1. Use [`ModelDims`] to pass dimensions through initialization
//! 2. Call [`ModelDims::validate`] before building a network from untrusted metadata
//! 3. The compile-time constants remain the defaults used by the service

/// Width of each seeker/candidate embedding vector.
pub const DEFAULT_EMBEDDING_DIM: usize = 32;

/// Widths of the dense hidden layers, input side first.
pub const DEFAULT_HIDDEN_DIMS: [usize; 3] = [64, 32, 16];

/// Dropout probability applied after every hidden layer during training.
pub const DEFAULT_DROPOUT: f32 = 0.2;

/// Standard deviation of the zero-centered normal used to initialize embeddings.
pub const EMBEDDING_INIT_STDDEV: f64 = 0.01;

/// Batch normalization epsilon (matches the common framework default).
pub const BATCH_NORM_EPS: f64 = 1e-5;

/// Batch normalization running-statistics momentum.
pub const BATCH_NORM_MOMENTUM: f64 = 0.1;

pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const DEFAULT_EPOCHS: usize = 10;

/// Fewer raw events (or derived examples) than this and training is skipped.
pub const MIN_TRAINING_EVENTS: usize = 10;

/// Score assigned to candidates that the model cannot rank.
pub const NEUTRAL_SCORE: f32 = 0.5;

pub const DEFAULT_TOP_K: usize = 10;

/// Direction literal emitted upstream for an approval; every other literal is a rejection.
pub const DEFAULT_APPROVE_DIRECTION: &str = "right";

/// Direction literal emitted upstream for a rejection.
pub const DEFAULT_REJECT_DIRECTION: &str = "left";

/// Bumped whenever the persisted layout of [`crate::checkpoint::Checkpoint`] changes.
pub const CHECKPOINT_VERSION: u32 = 1;

pub const DEFAULT_CHECKPOINT_FILENAME: &str = "preference_model.rkyv";

/// Runtime architecture configuration shared by the model and the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDims {
    /// Embedding vector width (per tower).
    pub embedding_dim: usize,
    /// Dense hidden layer widths, input side first.
    pub hidden_dims: Vec<usize>,
}

impl Default for ModelDims {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            hidden_dims: DEFAULT_HIDDEN_DIMS.to_vec(),
        }
    }
}

impl ModelDims {
    pub fn new(embedding_dim: usize, hidden_dims: Vec<usize>) -> Self {
        Self {
            embedding_dim,
            hidden_dims,
        }
    }

    /// Width of the concatenated two-tower input fed to the first dense layer.
    pub fn input_dim(&self) -> usize {
        self.embedding_dim * 2
    }

    /// Returns an error if any width is zero.
    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroEmbeddingDim);
        }
        if let Some(layer) = self.hidden_dims.iter().position(|&w| w == 0) {
            return Err(DimValidationError::ZeroHiddenWidth { layer });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimValidationError {
    ZeroEmbeddingDim,
    ZeroHiddenWidth { layer: usize },
}

impl std::fmt::Display for DimValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroEmbeddingDim => write!(f, "embedding dimension cannot be zero"),
            Self::ZeroHiddenWidth { layer } => {
                write!(f, "hidden layer {} has zero width", layer)
            }
        }
    }
}

impl std::error::Error for DimValidationError {}
