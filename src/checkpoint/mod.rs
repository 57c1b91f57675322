//! Durable snapshot of a trained model and its identifier mappings.
//!
//! Stored as a single `rkyv` archive. Writes go to a sibling temp file that is synced and
//! renamed over the target, so readers never observe a partially written checkpoint.
//!
//! The seeker and candidate id lists are stored in index order: position `i` holds the id
//! mapped to index `i`. The forward maps and the reverse candidate map are rebuilt from them.

pub mod error;


pub use error::{CheckpointError, CheckpointResult};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use candle_core::Device;
use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CHECKPOINT_VERSION, ModelDims};
use crate::index::{IdentifierIndex, VocabularyIndex};
use crate::model::{ModelConfig, NamedTensor, PreferenceModel};

const TEMP_SUFFIX: &str = "tmp";

/// One network parameter, flattened row-major.
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct StoredTensor {
    pub name: String,
    pub shape: Vec<u64>,
    pub data: Vec<f32>,
}

/// Everything needed to rebuild a [`PreferenceModel`] and its [`VocabularyIndex`].
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct Checkpoint {
    pub version: u32,
    pub num_seekers: u64,
    pub num_candidates: u64,
    pub embedding_dim: u64,
    pub hidden_dims: Vec<u64>,
    pub dropout: f32,
    /// Seeker ids in index order.
    pub seeker_ids: Vec<String>,
    /// Candidate ids in index order (the reverse candidate map).
    pub candidate_ids: Vec<String>,
    pub tensors: Vec<StoredTensor>,
}

impl Checkpoint {
    /// Snapshots `model` together with the index it was trained against.
    pub fn capture(model: &PreferenceModel, index: &VocabularyIndex) -> CheckpointResult<Self> {
        let config = model.config();

        if index.num_seekers() != config.num_seekers
            || index.num_candidates() != config.num_candidates
        {
            return Err(CheckpointError::Inconsistent {
                reason: format!(
                    "index has {}x{} ids but model expects {}x{}",
                    index.num_seekers(),
                    index.num_candidates(),
                    config.num_seekers,
                    config.num_candidates
                ),
            });
        }

        let tensors = model
            .named_tensors()?
            .into_iter()
            .map(|t| StoredTensor {
                name: t.name,
                shape: t.shape.into_iter().map(|d| d as u64).collect(),
                data: t.data,
            })
            .collect();

        Ok(Self {
            version: CHECKPOINT_VERSION,
            num_seekers: config.num_seekers as u64,
            num_candidates: config.num_candidates as u64,
            embedding_dim: config.embedding_dim() as u64,
            hidden_dims: config.hidden_dims().iter().map(|&d| d as u64).collect(),
            dropout: config.dropout,
            seeker_ids: index.seekers().ids().to_vec(),
            candidate_ids: index.candidates().ids().to_vec(),
            tensors,
        })
    }

    /// Architecture recorded in this checkpoint.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.num_seekers as usize, self.num_candidates as usize)
            .with_dims(ModelDims::new(
                self.embedding_dim as usize,
                self.hidden_dims.iter().map(|&d| d as usize).collect(),
            ))
            .with_dropout(self.dropout)
    }

    /// Validates metadata, rebuilds the network and restores its weights.
    ///
    /// Architecture parameters are checked against every stored tensor shape before any
    /// value is copied; a mismatch is reported as [`CheckpointError::Incompatible`].
    pub fn restore(&self, device: Device) -> CheckpointResult<(PreferenceModel, VocabularyIndex)> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                expected: CHECKPOINT_VERSION,
            });
        }

        if self.seeker_ids.len() as u64 != self.num_seekers {
            return Err(CheckpointError::Inconsistent {
                reason: format!(
                    "{} seeker ids for num_seekers={}",
                    self.seeker_ids.len(),
                    self.num_seekers
                ),
            });
        }
        if self.candidate_ids.len() as u64 != self.num_candidates {
            return Err(CheckpointError::Inconsistent {
                reason: format!(
                    "{} candidate ids for num_candidates={}",
                    self.candidate_ids.len(),
                    self.num_candidates
                ),
            });
        }

        let seekers = IdentifierIndex::from_ordered(self.seeker_ids.clone()).map_err(|id| {
            CheckpointError::Inconsistent {
                reason: format!("duplicate seeker id '{}'", id),
            }
        })?;
        let candidates =
            IdentifierIndex::from_ordered(self.candidate_ids.clone()).map_err(|id| {
                CheckpointError::Inconsistent {
                    reason: format!("duplicate candidate id '{}'", id),
                }
            })?;

        let tensors: Vec<NamedTensor> = self
            .tensors
            .iter()
            .map(|t| NamedTensor {
                name: t.name.clone(),
                shape: t.shape.iter().map(|&d| d as usize).collect(),
                data: t.data.clone(),
            })
            .collect();

        let model = PreferenceModel::from_named_tensors(self.model_config(), &tensors, device)?;

        Ok((model, VocabularyIndex::new(seekers, candidates)))
    }

    /// Serializes to `path`, creating missing parent directories. Returns bytes written.
    pub fn write(&self, path: &Path) -> CheckpointResult<u64> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let bytes = rkyv::to_bytes::<RkyvError>(self)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let temp_path = temp_path_for(path);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Checkpoint written");
        Ok(bytes.len() as u64)
    }

    /// Reads and validates the archive at `path`.
    pub fn read(path: &Path) -> CheckpointResult<Self> {
        if !path.exists() {
            return Err(CheckpointError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = fs::read(path)?;
        let mut aligned: AlignedVec = AlignedVec::with_capacity(raw.len());
        aligned.extend_from_slice(&raw);

        rkyv::from_bytes::<Self, RkyvError>(&aligned).map_err(|e| CheckpointError::Corrupt {
            reason: e.to_string(),
        })
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
