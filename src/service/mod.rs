//! Recommendation service: trains, persists, restores and queries the preference model.
//!
//! # Lifecycle
//!
//! Construct one [`RecommendationService`] at startup and share it (it is `Send + Sync`).
//! Construction attempts to restore the checkpoint; a missing or unreadable checkpoint
//! leaves the service untrained rather than failing.
//!
//! # Model swaps
//!
//! The trained model and its identifier index are installed together as one immutable
//! snapshot behind an `Arc`. [`RecommendationService::recommend`] clones the `Arc` and scores
//! without holding any lock, so a concurrent [`RecommendationService::train_model`] is only
//! ever observed as fully-old or fully-new. Training, saving and loading share one mutex, so
//! the checkpoint on disk matches the installed model once any of them returns.
//!
//! # Fallbacks
//!
//! Ranking never fails. When there is no model, the seeker is unknown, or none of the
//! candidates are known, the first `top_k` candidates come back in input order with
//! [`NEUTRAL_SCORE`]. Unknown candidates are appended after the scored ones, in input order.

pub mod config;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use types::{LoadOutcome, Recommendation, SkipReason, TrainingOutcome};

use std::path::Path;
use std::sync::Arc;

use candle_core::Device;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::constants::NEUTRAL_SCORE;
use crate::feedback::{FeedbackEvent, prepare_examples};
use crate::index::VocabularyIndex;
use crate::model::{ModelConfig, PreferenceModel, select_device};
use crate::training::Trainer;

/// A trained model and the index it was trained against. Never mutated once installed.
#[derive(Debug)]
pub struct ModelSnapshot {
    pub model: PreferenceModel,
    pub index: VocabularyIndex,
}

pub struct RecommendationService {
    config: ServiceConfig,
    device: Device,
    current: RwLock<Option<Arc<ModelSnapshot>>>,
    training: Mutex<()>,
}

impl std::fmt::Debug for RecommendationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationService")
            .field("device", &format!("{:?}", self.device))
            .field("checkpoint_path", &self.config.checkpoint_path)
            .field("trained", &self.is_trained())
            .finish()
    }
}

impl RecommendationService {
    /// Creates the service on the selected compute device and restores the checkpoint.
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let device = select_device()?;
        Ok(Self::with_device(config, device))
    }

    /// Creates the service on `device` and restores the checkpoint.
    pub fn with_device(config: ServiceConfig, device: Device) -> Self {
        let service = Self {
            config,
            device,
            current: RwLock::new(None),
            training: Mutex::new(()),
        };
        service.load_model();
        service
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.config.checkpoint_path
    }

    pub fn is_trained(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.current.read().clone()
    }

    pub fn num_seekers(&self) -> Option<usize> {
        self.snapshot().map(|s| s.model.num_seekers())
    }

    pub fn num_candidates(&self) -> Option<usize> {
        self.snapshot().map(|s| s.model.num_candidates())
    }

    pub fn embedding_dim(&self) -> Option<usize> {
        self.snapshot().map(|s| s.model.embedding_dim())
    }

    pub fn knows_seeker(&self, seeker_id: &str) -> bool {
        self.snapshot()
            .is_some_and(|s| s.index.seekers().contains(seeker_id))
    }

    pub fn knows_candidate(&self, candidate_id: &str) -> bool {
        self.snapshot()
            .is_some_and(|s| s.index.candidates().contains(candidate_id))
    }

    /// Retrains from scratch on `feedback` and installs the result.
    ///
    /// Too little data is not an error: it returns [`TrainingOutcome::Skipped`] and leaves the
    /// current model untouched. On any `Err` the current model is likewise untouched. The
    /// checkpoint is written before the new model is installed, so the durable and in-memory
    /// states never disagree.
    pub fn train_model(
        &self,
        feedback: &[FeedbackEvent],
        epochs: usize,
    ) -> ServiceResult<TrainingOutcome> {
        let _guard = self.training.lock();
        let required = self.config.min_training_events;

        if feedback.len() < required {
            warn!(
                events = feedback.len(),
                required, "Not enough feedback to train model"
            );
            return Ok(TrainingOutcome::Skipped {
                reason: SkipReason::InsufficientEvents {
                    found: feedback.len(),
                    required,
                },
            });
        }

        let index = VocabularyIndex::from_events(feedback);
        let examples = prepare_examples(feedback, &index, &self.config.approve_direction);

        if examples.len() < required {
            warn!(
                examples = examples.len(),
                required, "Not enough training examples after filtering"
            );
            return Ok(TrainingOutcome::Skipped {
                reason: SkipReason::InsufficientExamples {
                    found: examples.len(),
                    required,
                },
            });
        }

        let model_config = ModelConfig::new(index.num_seekers(), index.num_candidates())
            .with_dims(self.config.dims.clone())
            .with_dropout(self.config.dropout);
        let model = PreferenceModel::new_on(model_config, self.device.clone())?;

        let report = {
            let trainer_config = self.config.trainer.clone().with_epochs(epochs);
            let mut trainer = Trainer::new(&model, trainer_config)?;
            trainer.train(&examples)?
        };

        let checkpoint = Checkpoint::capture(&model, &index)?;
        let checkpoint_bytes = checkpoint.write(&self.config.checkpoint_path)?;

        let num_seekers = index.num_seekers();
        let num_candidates = index.num_candidates();
        *self.current.write() = Some(Arc::new(ModelSnapshot { model, index }));

        info!(
            num_seekers,
            num_candidates,
            examples = examples.len(),
            final_loss = ?report.final_loss(),
            path = %self.config.checkpoint_path.display(),
            "Model trained and installed"
        );

        Ok(TrainingOutcome::Trained {
            num_seekers,
            num_candidates,
            examples: examples.len(),
            final_loss: report.final_loss(),
            checkpoint_bytes,
        })
    }

    /// Ranks `candidate_ids` for `seeker_id`, returning at most `top_k` entries.
    pub fn recommend<S: AsRef<str>>(
        &self,
        seeker_id: &str,
        candidate_ids: &[S],
        top_k: usize,
    ) -> Vec<Recommendation> {
        let Some(snapshot) = self.snapshot() else {
            debug!("No model loaded, returning neutral ranking");
            return neutral_ranking(candidate_ids, top_k);
        };

        let Some(seeker_idx) = snapshot.index.seekers().lookup(seeker_id) else {
            debug!(seeker_id, "Unknown seeker, returning neutral ranking");
            return neutral_ranking(candidate_ids, top_k);
        };

        let candidates = snapshot.index.candidates();
        let mut known: Vec<(&str, u32)> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for id in candidate_ids {
            let id = id.as_ref();
            match candidates.lookup(id) {
                Some(idx) => known.push((id, idx)),
                None => unknown.push(id),
            }
        }

        if known.is_empty() {
            debug!(seeker_id, "No known candidates, returning neutral ranking");
            return neutral_ranking(candidate_ids, top_k);
        }

        let pairs: Vec<(u32, u32)> = known.iter().map(|&(_, c)| (seeker_idx, c)).collect();
        let scores = match snapshot.model.predict(&pairs) {
            Ok(scores) => scores,
            Err(e) => {
                error!(error = %e, seeker_id, "Scoring failed, returning neutral ranking");
                return neutral_ranking(candidate_ids, top_k);
            }
        };

        let mut ranked: Vec<Recommendation> = known
            .iter()
            .zip(scores)
            .map(|(&(id, _), score)| Recommendation::new(id, score))
            .collect();
        // `sort_by` is stable: equal scores keep their input order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        ranked.extend(
            unknown
                .into_iter()
                .map(|id| Recommendation::new(id, NEUTRAL_SCORE)),
        );
        ranked.truncate(top_k);

        debug!(
            seeker_id,
            scored = pairs.len(),
            returned = ranked.len(),
            "Ranked candidates"
        );
        ranked
    }

    /// [`Self::recommend`] with the configured [`ServiceConfig::top_k`].
    pub fn recommend_default<S: AsRef<str>>(
        &self,
        seeker_id: &str,
        candidate_ids: &[S],
    ) -> Vec<Recommendation> {
        self.recommend(seeker_id, candidate_ids, self.config.top_k)
    }

    /// Writes the current model to the checkpoint path. Returns `Ok(None)` when untrained.
    ///
    /// Waits for any running training so an older snapshot never overwrites a newer checkpoint.
    pub fn save_model(&self) -> ServiceResult<Option<u64>> {
        let _guard = self.training.lock();
        let Some(snapshot) = self.snapshot() else {
            return Ok(None);
        };

        let checkpoint = Checkpoint::capture(&snapshot.model, &snapshot.index)?;
        let bytes = checkpoint.write(&self.config.checkpoint_path)?;
        info!(
            path = %self.config.checkpoint_path.display(),
            bytes, "Model saved"
        );
        Ok(Some(bytes))
    }

    /// Restores the checkpoint. Never fails.
    ///
    /// A missing file leaves the current state alone. An unreadable or incompatible checkpoint
    /// resets the service to untrained. Serialized with training like [`Self::save_model`].
    pub fn load_model(&self) -> LoadOutcome {
        let _guard = self.training.lock();
        let path = &self.config.checkpoint_path;

        let restored = Checkpoint::read(path).and_then(|c| c.restore(self.device.clone()));

        match restored {
            Ok((model, index)) => {
                let num_seekers = model.num_seekers();
                let num_candidates = model.num_candidates();
                *self.current.write() = Some(Arc::new(ModelSnapshot { model, index }));
                info!(
                    path = %path.display(),
                    num_seekers,
                    num_candidates,
                    "Model loaded"
                );
                LoadOutcome::Loaded {
                    num_seekers,
                    num_candidates,
                }
            }
            Err(CheckpointError::NotFound { .. }) => {
                warn!(path = %path.display(), "Model checkpoint not found");
                LoadOutcome::NotFound
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error loading model");
                *self.current.write() = None;
                LoadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn neutral_ranking<S: AsRef<str>>(candidate_ids: &[S], top_k: usize) -> Vec<Recommendation> {
    candidate_ids
        .iter()
        .take(top_k)
        .map(|id| Recommendation::new(id.as_ref(), NEUTRAL_SCORE))
        .collect()
}
