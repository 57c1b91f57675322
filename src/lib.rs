//! Affinity library crate (used by the training job binary and integration tests).
//!
//! Learns pairwise preferences from approve/reject feedback and ranks candidates for a
//! seeker with a small neural collaborative filtering model.
//!
//! # Public API Surface
//!
//! ## Service (Stable)
//! - [`RecommendationService`], [`ServiceConfig`] - Train, persist, restore and rank
//! - [`Recommendation`], [`TrainingOutcome`], [`LoadOutcome`] - Service results
//!
//! ## Data
//! - [`FeedbackEvent`], [`TrainingExample`] - Raw feedback and labeled index pairs
//! - [`IdentifierIndex`], [`VocabularyIndex`] - Dense index assignment for ids
//!
//! ## Model & Training
//! - [`PreferenceModel`], [`ModelConfig`] - Two-tower network with an MLP head
//! - [`Trainer`], [`TrainerConfig`] - Mini-batch Adam training on binary cross-entropy
//! - [`Checkpoint`] - Durable snapshot of a model plus its index
//!
//! ## Utilities
//! - [`Config`] - `AFFINITY_*` environment configuration
//! - [`synthetic`] - Demo feedback generation
//! - [`ModelDims`] - Architecture dimensions and validation

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod feedback;
pub mod index;
pub mod model;
pub mod service;
pub mod synthetic;
pub mod training;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointResult};
pub use config::{Config, ConfigError};
pub use constants::{DimValidationError, ModelDims, NEUTRAL_SCORE};
pub use feedback::{FeedbackEvent, TrainingExample, prepare_examples};
pub use index::{IdentifierIndex, VocabularyIndex};
pub use model::{ModelConfig, ModelError, NamedTensor, PreferenceModel, select_device};
pub use service::{
    LoadOutcome, ModelSnapshot, Recommendation, RecommendationService, ServiceConfig,
    ServiceError, ServiceResult, SkipReason, TrainingOutcome,
};
pub use training::{EpochReport, Trainer, TrainerConfig, TrainingError, TrainingReport};
