use crate::constants::{DEFAULT_DROPOUT, ModelDims};

/// Shape of a [`PreferenceModel`](super::PreferenceModel) network.
///
/// Everything needed to rebuild the network before restoring weights; persisted verbatim
/// in checkpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub num_seekers: usize,
    pub num_candidates: usize,
    pub dims: ModelDims,
    /// Dropout probability after each hidden layer (training only).
    pub dropout: f32,
}

impl ModelConfig {
    /// Default architecture sized to the given vocabularies.
    pub fn new(num_seekers: usize, num_candidates: usize) -> Self {
        Self {
            num_seekers,
            num_candidates,
            dims: ModelDims::default(),
            dropout: DEFAULT_DROPOUT,
        }
    }

    pub fn with_dims(mut self, dims: ModelDims) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn embedding_dim(&self) -> usize {
        self.dims.embedding_dim
    }

    pub fn hidden_dims(&self) -> &[usize] {
        &self.dims.hidden_dims
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.num_seekers == 0 {
            return Err("num_seekers must be at least 1".to_string());
        }
        if self.num_candidates == 0 {
            return Err("num_candidates must be at least 1".to_string());
        }
        if self.num_seekers > u32::MAX as usize || self.num_candidates > u32::MAX as usize {
            return Err("vocabulary exceeds u32 index space".to_string());
        }
        self.dims.validate().map_err(|e| e.to_string())?;
        if self.dims.embedding_dim.checked_mul(2).is_none() {
            return Err(format!(
                "embedding_dim {} overflows the concatenated input width",
                self.dims.embedding_dim
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(format!(
                "dropout must be in [0.0, 1.0), got {}",
                self.dropout
            ));
        }
        Ok(())
    }
}
