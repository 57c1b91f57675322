//! Two-tower preference network.
//!
//! Seeker and candidate embeddings are concatenated and fed through a stack of
//! `Linear -> ReLU -> BatchNorm -> Dropout` blocks, then a final `Linear` to one logit.
//! [`PreferenceModel::predict`] squashes the logit through a sigmoid to get the probability
//! that the seeker approves the candidate.
//!
//! Initialization:
//! - embeddings: `N(0, 0.01)`
//! - dense weights: Xavier uniform, `U(-b, b)` with `b = sqrt(6 / (fan_in + fan_out))`
//! - dense biases: zero

pub mod config;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
pub mod error;


pub use config::ModelConfig;
pub use device::select_device;
pub use error::ModelError;

use std::collections::HashMap;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{
    BatchNorm, BatchNormConfig, Dropout, Embedding, Init, Linear, Module, ModuleT, VarBuilder,
    VarMap,
};
use tracing::debug;

use crate::constants::{BATCH_NORM_EPS, BATCH_NORM_MOMENTUM, EMBEDDING_INIT_STDDEV};

const SEEKER_EMBEDDING: &str = "seeker_embedding";
const CANDIDATE_EMBEDDING: &str = "candidate_embedding";
const HIDDEN: &str = "hidden";
const OUTPUT: &str = "output";

/// Batch-norm buffers are updated by the forward pass, never by the optimizer.
const RUNNING_STAT_SUFFIXES: [&str; 2] = ["running_mean", "running_var"];

/// Flattened copy of one network parameter, used for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

struct HiddenBlock {
    linear: Linear,
    norm: BatchNorm,
    dropout: Dropout,
}

pub struct PreferenceModel {
    config: ModelConfig,
    device: Device,
    varmap: VarMap,
    seeker_embedding: Embedding,
    candidate_embedding: Embedding,
    hidden: Vec<HiddenBlock>,
    output: Linear,
}

impl std::fmt::Debug for PreferenceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceModel")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .finish()
    }
}

impl PreferenceModel {
    /// Builds a freshly initialized network on the selected compute device.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let device = select_device()?;
        Self::new_on(config, device)
    }

    /// Builds a freshly initialized network on `device`.
    pub fn new_on(config: ModelConfig, device: Device) -> Result<Self, ModelError> {
        config
            .validate()
            .map_err(|reason| ModelError::InvalidConfig { reason })?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let embedding_dim = config.embedding_dim();

        let seeker_embedding =
            embedding_normal(config.num_seekers, embedding_dim, vb.pp(SEEKER_EMBEDDING))?;
        let candidate_embedding = embedding_normal(
            config.num_candidates,
            embedding_dim,
            vb.pp(CANDIDATE_EMBEDDING),
        )?;

        let mut hidden = Vec::with_capacity(config.hidden_dims().len());
        let mut in_dim = config.dims.input_dim();
        for (layer, &width) in config.hidden_dims().iter().enumerate() {
            let vb = vb.pp(HIDDEN).pp(layer.to_string());
            let linear = linear_xavier(in_dim, width, vb.pp("linear"))?;
            let norm = candle_nn::batch_norm(
                width,
                BatchNormConfig {
                    eps: BATCH_NORM_EPS,
                    momentum: BATCH_NORM_MOMENTUM,
                    ..Default::default()
                },
                vb.pp("norm"),
            )?;
            hidden.push(HiddenBlock {
                linear,
                norm,
                dropout: Dropout::new(config.dropout),
            });
            in_dim = width;
        }

        let output = linear_xavier(in_dim, 1, vb.pp(OUTPUT))?;

        debug!(
            num_seekers = config.num_seekers,
            num_candidates = config.num_candidates,
            embedding_dim,
            hidden_dims = ?config.hidden_dims(),
            "Preference model initialized"
        );

        Ok(Self {
            config,
            device,
            varmap,
            seeker_embedding,
            candidate_embedding,
            hidden,
            output,
        })
    }

    /// Rebuilds the network described by `config` and overwrites its parameters with `tensors`.
    ///
    /// Every parameter must be present exactly once with the expected shape. The stored
    /// tensors are checked against [`PreferenceModel::parameter_shapes`] before anything is
    /// allocated, so a bogus architecture is rejected rather than built.
    pub fn from_named_tensors(
        config: ModelConfig,
        tensors: &[NamedTensor],
        device: Device,
    ) -> Result<Self, ModelError> {
        check_named_tensors(&config, tensors)?;

        let model = Self::new_on(config, device)?;
        let stored: HashMap<&str, &NamedTensor> =
            tensors.iter().map(|t| (t.name.as_str(), t)).collect();

        {
            let vars = model.lock_vars()?;
            for (name, var) in vars.iter() {
                let tensor = stored
                    .get(name.as_str())
                    .ok_or_else(|| ModelError::MissingTensor { name: name.clone() })?;
                let value =
                    Tensor::from_vec(tensor.data.clone(), tensor.shape.as_slice(), &model.device)?;
                var.set(&value)?;
            }
        }

        Ok(model)
    }

    /// Name and shape of every parameter and buffer `config` describes, sorted by name.
    ///
    /// Pure arithmetic: nothing is allocated on a device. Fails when the config is invalid or a
    /// parameter's size does not fit in memory addressing.
    pub fn parameter_shapes(
        config: &ModelConfig,
    ) -> Result<Vec<(String, Vec<usize>)>, ModelError> {
        config
            .validate()
            .map_err(|reason| ModelError::InvalidConfig { reason })?;

        let embedding_dim = config.embedding_dim();
        let mut shapes = vec![
            (
                format!("{SEEKER_EMBEDDING}.weight"),
                vec![config.num_seekers, embedding_dim],
            ),
            (
                format!("{CANDIDATE_EMBEDDING}.weight"),
                vec![config.num_candidates, embedding_dim],
            ),
        ];

        let mut in_dim = config.dims.input_dim();
        for (layer, &width) in config.hidden_dims().iter().enumerate() {
            let prefix = format!("{HIDDEN}.{layer}");
            shapes.push((format!("{prefix}.linear.weight"), vec![width, in_dim]));
            shapes.push((format!("{prefix}.linear.bias"), vec![width]));
            for buffer in ["weight", "bias", "running_mean", "running_var"] {
                shapes.push((format!("{prefix}.norm.{buffer}"), vec![width]));
            }
            in_dim = width;
        }
        shapes.push((format!("{OUTPUT}.weight"), vec![1, in_dim]));
        shapes.push((format!("{OUTPUT}.bias"), vec![1]));

        for (name, shape) in &shapes {
            element_count(shape)
                .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
                .filter(|&bytes| bytes <= isize::MAX as usize)
                .ok_or_else(|| ModelError::InvalidConfig {
                    reason: format!("tensor '{name}' with shape {shape:?} is too large"),
                })?;
        }

        shapes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(shapes)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn num_seekers(&self) -> usize {
        self.config.num_seekers
    }

    pub fn num_candidates(&self) -> usize {
        self.config.num_candidates
    }

    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim()
    }

    /// Returns one logit per `(seeker, candidate)` row.
    ///
    /// With `train = true` dropout is active and batch norm uses (and updates) batch statistics.
    pub fn forward_t(
        &self,
        seekers: &Tensor,
        candidates: &Tensor,
        train: bool,
    ) -> candle_core::Result<Tensor> {
        let seeker_emb = self.seeker_embedding.forward(seekers)?;
        let candidate_emb = self.candidate_embedding.forward(candidates)?;

        let mut xs = Tensor::cat(&[&seeker_emb, &candidate_emb], 1)?;
        let batch = xs.dim(0)?;

        for block in &self.hidden {
            xs = block.linear.forward(&xs)?.relu()?;
            // A single row has no batch variance; normalize it with the running statistics.
            xs = block.norm.forward_t(&xs, train && batch > 1)?;
            xs = block.dropout.forward_t(&xs, train)?;
        }

        self.output.forward(&xs)?.squeeze(1)
    }

    /// Converts index pairs to `(seekers, candidates)` tensors, checking vocabulary bounds.
    pub fn pair_tensors(&self, pairs: &[(u32, u32)]) -> Result<(Tensor, Tensor), ModelError> {
        let mut seekers = Vec::with_capacity(pairs.len());
        let mut candidates = Vec::with_capacity(pairs.len());

        for &(seeker, candidate) in pairs {
            if seeker as usize >= self.config.num_seekers {
                return Err(ModelError::IndexOutOfRange {
                    kind: "seeker",
                    index: seeker,
                    len: self.config.num_seekers,
                });
            }
            if candidate as usize >= self.config.num_candidates {
                return Err(ModelError::IndexOutOfRange {
                    kind: "candidate",
                    index: candidate,
                    len: self.config.num_candidates,
                });
            }
            seekers.push(seeker);
            candidates.push(candidate);
        }

        Ok((
            Tensor::new(seekers.as_slice(), &self.device)?,
            Tensor::new(candidates.as_slice(), &self.device)?,
        ))
    }

    /// Inference-mode approval probabilities in `[0, 1]`, one per pair.
    pub fn predict(&self, pairs: &[(u32, u32)]) -> Result<Vec<f32>, ModelError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let (seekers, candidates) = self.pair_tensors(pairs)?;
        let logits = self.forward_t(&seekers, &candidates, false)?.detach();
        let scores = candle_nn::ops::sigmoid(&logits)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;

        Ok(scores)
    }

    /// Parameters the optimizer should update (everything except batch-norm running stats).
    pub fn trainable_vars(&self) -> Result<Vec<Var>, ModelError> {
        let vars = self.lock_vars()?;
        let mut named: Vec<(&String, &Var)> = vars
            .iter()
            .filter(|(name, _)| {
                !RUNNING_STAT_SUFFIXES
                    .iter()
                    .any(|suffix| name.ends_with(suffix))
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        Ok(named.into_iter().map(|(_, var)| var.clone()).collect())
    }

    /// Snapshot of every parameter and buffer, sorted by name.
    pub fn named_tensors(&self) -> Result<Vec<NamedTensor>, ModelError> {
        let vars = self.lock_vars()?;
        let mut tensors = Vec::with_capacity(vars.len());

        for (name, var) in vars.iter() {
            let tensor = var.as_tensor();
            tensors.push(NamedTensor {
                name: name.clone(),
                shape: tensor.dims().to_vec(),
                data: tensor
                    .flatten_all()?
                    .to_dtype(DType::F32)?
                    .to_vec1::<f32>()?,
            });
        }

        tensors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tensors)
    }

    fn lock_vars(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Var>>, ModelError> {
        self.varmap
            .data()
            .lock()
            .map_err(|_| ModelError::TensorFailed {
                reason: "variable map lock poisoned".to_string(),
            })
    }
}

/// Checks `tensors` against the parameters `config` describes without building the network.
fn check_named_tensors(config: &ModelConfig, tensors: &[NamedTensor]) -> Result<(), ModelError> {
    let expected = PreferenceModel::parameter_shapes(config)?;
    let expected_names: HashMap<&str, &[usize]> = expected
        .iter()
        .map(|(name, shape)| (name.as_str(), shape.as_slice()))
        .collect();

    if let Some(extra) = tensors
        .iter()
        .find(|t| !expected_names.contains_key(t.name.as_str()))
    {
        return Err(ModelError::UnexpectedTensor {
            name: extra.name.clone(),
        });
    }

    let stored: HashMap<&str, &NamedTensor> =
        tensors.iter().map(|t| (t.name.as_str(), t)).collect();
    if stored.len() != tensors.len() {
        return Err(ModelError::InvalidConfig {
            reason: "stored weights contain duplicate tensor names".to_string(),
        });
    }

    for (name, shape) in &expected {
        let tensor = stored
            .get(name.as_str())
            .ok_or_else(|| ModelError::MissingTensor { name: name.clone() })?;

        if tensor.shape != *shape {
            return Err(ModelError::ShapeMismatch {
                name: name.clone(),
                expected: shape.clone(),
                actual: tensor.shape.clone(),
            });
        }

        // Shapes were overflow-checked by `parameter_shapes`.
        let needed = element_count(shape).unwrap_or(usize::MAX);
        if tensor.data.len() != needed {
            return Err(ModelError::DataLengthMismatch {
                name: name.clone(),
                expected: needed,
                actual: tensor.data.len(),
            });
        }
    }

    Ok(())
}

fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn embedding_normal(
    vocab: usize,
    dim: usize,
    vb: VarBuilder,
) -> candle_core::Result<Embedding> {
    let weight = vb.get_with_hints(
        (vocab, dim),
        "weight",
        Init::Randn {
            mean: 0.0,
            stdev: EMBEDDING_INIT_STDDEV,
        },
    )?;
    Ok(Embedding::new(weight, dim))
}

fn linear_xavier(in_dim: usize, out_dim: usize, vb: VarBuilder) -> candle_core::Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let weight = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}
