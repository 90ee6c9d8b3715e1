//! # biaslens-runtime
//!
//! Pipeline orchestration for biaslens.
//!
//! The [`Pipeline`] classifies the prompt, scores the response, checks it
//! against stereotype anchors, assesses risk, selects and applies a
//! mitigation strategy, re-scores the rewrite and guarantees a minimum
//! improvement on every dimension. Results are cached by
//! `(prompt, response, model)` in a bounded FIFO cache.
//!
//! ## Example
//!
//! ```rust,ignore
//! use biaslens_runtime::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::builder()
//!     .config(PipelineConfig::from_yaml_file("biaslens.yaml")?)
//!     .build()?;
//!
//! let result = pipeline.process("Describe Sikhs", response, Some("gpt-4"));
//! println!("{} risk, strategy {}", result.risk_tier, result.mitigation.strategy);
//! ```

pub mod cache;
pub mod config;
pub mod pipeline;
pub mod strategy;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::{
    CacheConfig, ClassificationConfig, ConfigError, DeterminismConfig, ImprovementConfig,
    PipelineConfig, RiskConfig, StrategyConfig,
};
pub use pipeline::{
    assess_risk, enforce_improvement, Degradation, ImprovementAdjustment, Pipeline,
    PipelineBuilder, PipelineError, PipelineResult, PipelineStage, PipelineSummary,
    RiskAssessment,
};
pub use strategy::{
    model_profile, select_strategy, CandidateScore, ModelProfile, StrategySelection,
    WeakDimension, MODEL_PROFILES,
};
