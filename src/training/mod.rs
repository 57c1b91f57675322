//! Mini-batch training loop for [`PreferenceModel`].
//!
//! Fixed-budget offline job: shuffle, split into contiguous batches, take one Adam step per
//! batch, repeat for the configured number of epochs. No validation split, no early stopping.

pub mod config;
pub mod error;


pub use config::TrainerConfig;
pub use error::TrainingError;

use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::feedback::TrainingExample;
use crate::model::PreferenceModel;

use config::{ADAM_BETA1, ADAM_BETA2, ADAM_EPS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub mean_loss: f32,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.mean_loss)
    }
}

/// Binary cross-entropy on logits, averaged over the batch.
///
/// Equal to BCE on `sigmoid(logits)`, computed as `max(x, 0) - x*y + ln(1 + e^-|x|)`
/// so saturated predictions never produce `ln(0)`.
pub fn bce_with_logits(logits: &Tensor, labels: &Tensor) -> candle_core::Result<Tensor> {
    let positive = logits.relu()?;
    let xy = (logits * labels)?;
    let softplus = (logits.abs()?.neg()?.exp()? + 1.0)?.log()?;
    ((positive - xy)? + softplus)?.mean_all()
}

pub struct Trainer<'m> {
    model: &'m PreferenceModel,
    optimizer: AdamW,
    config: TrainerConfig,
    rng: StdRng,
}

impl std::fmt::Debug for Trainer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish()
    }
}

impl<'m> Trainer<'m> {
    pub fn new(model: &'m PreferenceModel, config: TrainerConfig) -> Result<Self, TrainingError> {
        config
            .validate()
            .map_err(|reason| TrainingError::InvalidConfig { reason })?;

        let params = ParamsAdamW {
            lr: config.learning_rate,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            eps: ADAM_EPS,
            weight_decay: 0.0,
        };
        let optimizer = AdamW::new(model.trainable_vars()?, params)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            model,
            optimizer,
            config,
            rng,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Shuffles `examples` in place and runs one pass over it; returns the mean batch loss.
    ///
    /// Batches are [`TrainerConfig::batch_size`] examples (the last may be shorter); set it
    /// with [`TrainerConfig::with_batch_size`]. Returns `0.0` without touching the model when
    /// `examples` is empty.
    pub fn train_epoch(&mut self, examples: &mut [TrainingExample]) -> Result<f32, TrainingError> {
        Ok(self.run_epoch(examples)?.0)
    }

    /// Runs `config.epochs` epochs sequentially, logging the mean loss of each.
    pub fn train(
        &mut self,
        examples: &[TrainingExample],
    ) -> Result<TrainingReport, TrainingError> {
        let epochs = self.config.epochs;
        info!(
            epochs,
            examples = examples.len(),
            batch_size = self.config.batch_size,
            "Training preference model"
        );

        let mut shuffled = examples.to_vec();
        let mut report = TrainingReport::default();

        for epoch in 1..=epochs {
            let (mean_loss, batches) = self.run_epoch(&mut shuffled)?;
            if !mean_loss.is_finite() {
                return Err(TrainingError::NonFiniteLoss {
                    epoch,
                    loss: mean_loss,
                });
            }
            info!(epoch, epochs, loss = mean_loss, "Epoch complete");
            report.epochs.push(EpochReport {
                epoch,
                mean_loss,
                batches,
            });
        }

        info!(final_loss = ?report.final_loss(), "Training completed");
        Ok(report)
    }

    fn run_epoch(&mut self, examples: &mut [TrainingExample]) -> Result<(f32, usize), TrainingError> {
        if examples.is_empty() {
            return Ok((0.0, 0));
        }

        examples.shuffle(&mut self.rng);

        let device = self.model.device().clone();
        let mut total_loss = 0.0f32;
        let mut batches = 0usize;

        for batch in examples.chunks(self.config.batch_size) {
            let seekers: Vec<u32> = batch.iter().map(|e| e.seeker_idx).collect();
            let candidates: Vec<u32> = batch.iter().map(|e| e.candidate_idx).collect();
            let labels: Vec<f32> = batch.iter().map(|e| e.label).collect();

            let seekers = Tensor::new(seekers.as_slice(), &device)?;
            let candidates = Tensor::new(candidates.as_slice(), &device)?;
            let labels = Tensor::new(labels.as_slice(), &device)?;

            let logits = self.model.forward_t(&seekers, &candidates, true)?;
            let loss = bce_with_logits(&logits, &labels)?;
            self.optimizer.backward_step(&loss)?;

            total_loss += loss.to_scalar::<f32>()?;
            batches += 1;
        }

        let mean_loss = total_loss / batches as f32;
        debug!(batches, mean_loss, "Epoch pass finished");
        Ok((mean_loss, batches))
    }
}
