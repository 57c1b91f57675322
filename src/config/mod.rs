//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `AFFINITY_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_APPROVE_DIRECTION, DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT_FILENAME, DEFAULT_EPOCHS,
    DEFAULT_LEARNING_RATE, DEFAULT_TOP_K,
};
use crate::service::ServiceConfig;
use crate::training::TrainerConfig;

/// Training job and service configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `AFFINITY_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Checkpoint file. Default: `./.data/preference_model.rkyv`.
    pub checkpoint_path: PathBuf,

    /// Epochs per training run. Default: `10`.
    pub epochs: usize,

    /// Mini-batch size. Default: `128`.
    pub batch_size: usize,

    /// Optimizer learning rate. Default: `0.001`.
    pub learning_rate: f64,

    /// Direction literal that counts as an approval. Default: `right`.
    pub approve_direction: String,

    /// Ranking length when the caller does not pass one. Default: `10`.
    ///
    /// Carried into [`ServiceConfig::top_k`].
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("./.data").join(DEFAULT_CHECKPOINT_FILENAME),
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            approve_direction: DEFAULT_APPROVE_DIRECTION.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Config {
    const ENV_CHECKPOINT_PATH: &'static str = "AFFINITY_CHECKPOINT_PATH";
    const ENV_EPOCHS: &'static str = "AFFINITY_EPOCHS";
    const ENV_BATCH_SIZE: &'static str = "AFFINITY_BATCH_SIZE";
    const ENV_LEARNING_RATE: &'static str = "AFFINITY_LEARNING_RATE";
    const ENV_APPROVE_DIRECTION: &'static str = "AFFINITY_APPROVE_DIRECTION";
    const ENV_TOP_K: &'static str = "AFFINITY_TOP_K";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let checkpoint_path =
            Self::parse_path_from_env(Self::ENV_CHECKPOINT_PATH, defaults.checkpoint_path);
        let epochs = Self::parse_from_env(Self::ENV_EPOCHS, defaults.epochs)?;
        let batch_size = Self::parse_from_env(Self::ENV_BATCH_SIZE, defaults.batch_size)?;
        let learning_rate = Self::parse_from_env(Self::ENV_LEARNING_RATE, defaults.learning_rate)?;
        let approve_direction =
            Self::parse_string_from_env(Self::ENV_APPROVE_DIRECTION, defaults.approve_direction);
        let top_k = Self::parse_from_env(Self::ENV_TOP_K, defaults.top_k)?;

        Ok(Self {
            checkpoint_path,
            epochs,
            batch_size,
            learning_rate,
            approve_direction,
            top_k,
        })
    }

    /// Validates basic invariants (does not touch the checkpoint file).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoint_path.is_dir() {
            return Err(ConfigError::IsADirectory {
                path: self.checkpoint_path.clone(),
            });
        }

        if self.epochs == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_EPOCHS,
                reason: "must be at least 1".to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_BATCH_SIZE,
                reason: "must be at least 1".to_string(),
            });
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_LEARNING_RATE,
                reason: format!("must be positive and finite, got {}", self.learning_rate),
            });
        }

        if self.approve_direction.is_empty() {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_APPROVE_DIRECTION,
                reason: "cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Service settings derived from this configuration.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig::new(self.checkpoint_path.clone())
            .with_approve_direction(self.approve_direction.clone())
            .with_top_k(self.top_k)
            .with_trainer(
                TrainerConfig::default()
                    .with_epochs(self.epochs)
                    .with_batch_size(self.batch_size)
                    .with_learning_rate(self.learning_rate),
            )
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::ParseError {
                    name: var_name,
                    value: value.clone(),
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }
}
