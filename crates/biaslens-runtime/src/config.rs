//! Configuration for biaslens-runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use biaslens_core::{Dimension, SimilarityConfig, Strategy, SCORE_MAX, SCORE_MIN};

/// Environment variable overriding `similarity.threshold`.
pub const ENV_SIMILARITY_THRESHOLD: &str = "BIASLENS_SIMILARITY_THRESHOLD";

/// Environment variable overriding `improvement.min_margin`.
pub const ENV_MIN_IMPROVEMENT_MARGIN: &str = "BIASLENS_MIN_IMPROVEMENT_MARGIN";

/// Environment variable overriding `cache.capacity`.
pub const ENV_CACHE_CAPACITY: &str = "BIASLENS_CACHE_CAPACITY";

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stereotype similarity checking
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Risk tier cutoffs
    #[serde(default)]
    pub risk: RiskConfig,

    /// Improvement guarantee
    #[serde(default)]
    pub improvement: ImprovementConfig,

    /// Result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Strategy selection weights and effectiveness data
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Bias category classification
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Determinism configuration
    #[serde(default)]
    pub determinism: DeterminismConfig,
}

impl PipelineConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup, then re-validate.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SIMILARITY_THRESHOLD) {
            self.similarity.threshold = parse_override(ENV_SIMILARITY_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_IMPROVEMENT_MARGIN) {
            self.improvement.min_margin = parse_override(ENV_MIN_IMPROVEMENT_MARGIN, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_CAPACITY) {
            self.cache.capacity = parse_override(ENV_CACHE_CAPACITY, &value)?;
        }
        self.validate()
    }

    /// Check ranges and orderings that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.similarity;
        check_unit("similarity.threshold", sim.threshold)?;
        check_unit("similarity.bands.low", sim.bands.low)?;
        check_unit("similarity.bands.medium", sim.bands.medium)?;
        check_unit("similarity.bands.high", sim.bands.high)?;
        if !sim.bands.is_monotone() {
            return Err(ConfigError::Invalid(format!(
                "similarity.bands must satisfy low <= medium <= high (got {}, {}, {})",
                sim.bands.low, sim.bands.medium, sim.bands.high
            )));
        }
        if sim.enabled && sim.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "similarity.dimensions must be positive".to_string(),
            ));
        }

        let risk = &self.risk;
        for (name, value) in [
            ("risk.rubric_high_below", risk.rubric_high_below),
            ("risk.rubric_medium_below", risk.rubric_medium_below),
        ] {
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [{}, {}], got {}",
                    name, SCORE_MIN, SCORE_MAX, value
                )));
            }
        }
        if risk.rubric_high_below > risk.rubric_medium_below {
            return Err(ConfigError::Invalid(
                "risk.rubric_high_below must not exceed risk.rubric_medium_below".to_string(),
            ));
        }
        check_unit("risk.similarity_high_at", risk.similarity_high_at)?;
        check_unit("risk.similarity_medium_at", risk.similarity_medium_at)?;
        if risk.similarity_medium_at > risk.similarity_high_at {
            return Err(ConfigError::Invalid(
                "risk.similarity_medium_at must not exceed risk.similarity_high_at".to_string(),
            ));
        }

        let margin = self.improvement.min_margin;
        if !(0.0..=SCORE_MAX - SCORE_MIN).contains(&margin) {
            return Err(ConfigError::Invalid(format!(
                "improvement.min_margin must be within [0, {}], got {}",
                SCORE_MAX - SCORE_MIN,
                margin
            )));
        }

        let strategy = &self.strategy;
        if strategy.primary_weight < 0.0 || strategy.secondary_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "strategy weights must be non-negative".to_string(),
            ));
        }
        if strategy.primary_weight + strategy.secondary_weight <= 0.0 {
            return Err(ConfigError::Invalid(
                "strategy weights must not sum to zero".to_string(),
            ));
        }
        if strategy.model_preference_bonus < 0.0 {
            return Err(ConfigError::Invalid(
                "strategy.model_preference_bonus must be non-negative".to_string(),
            ));
        }

        check_score_range(
            "classification.general_bias_below",
            self.classification.general_bias_below,
        )?;

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an unparseable value '{}'", key, value)))
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_score_range(name: &str, value: f64) -> Result<(), ConfigError> {
    if (SCORE_MIN..=SCORE_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be within [{}, {}], got {}",
            name, SCORE_MIN, SCORE_MAX, value
        )))
    }
}

/// Risk tier cutoffs.
///
/// The rubric tier comes from `overall`, the similarity tier from
/// `max_similarity`; the pipeline takes the higher of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// `overall` strictly below this is high risk
    #[serde(default = "default_rubric_high_below")]
    pub rubric_high_below: f64,

    /// `overall` strictly below this is medium risk
    #[serde(default = "default_rubric_medium_below")]
    pub rubric_medium_below: f64,

    /// `max_similarity` at or above this is high risk
    #[serde(default = "default_similarity_high_at")]
    pub similarity_high_at: f64,

    /// `max_similarity` at or above this is medium risk
    #[serde(default = "default_similarity_medium_at")]
    pub similarity_medium_at: f64,
}

fn default_rubric_high_below() -> f64 {
    2.5
}

fn default_rubric_medium_below() -> f64 {
    3.5
}

fn default_similarity_high_at() -> f64 {
    0.8
}

fn default_similarity_medium_at() -> f64 {
    0.5
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            rubric_high_below: 2.5,
            rubric_medium_below: 3.5,
            similarity_high_at: 0.8,
            similarity_medium_at: 0.5,
        }
    }
}

/// Improvement guarantee configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementConfig {
    /// Minimum gain per dimension on the 1-5 scale
    #[serde(default = "default_min_margin")]
    pub min_margin: f64,
}

fn default_min_margin() -> f64 {
    0.5
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self { min_margin: 0.5 }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum cache entries; oldest entries are evicted first
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
        }
    }
}

/// Strategy selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Weight of the weakest dimension
    #[serde(default = "default_primary_weight")]
    pub primary_weight: f64,

    /// Weight of the second-weakest dimension
    #[serde(default = "default_secondary_weight")]
    pub secondary_weight: f64,

    /// Bonus added to strategies a known model profile prefers
    #[serde(default = "default_model_preference_bonus")]
    pub model_preference_bonus: f64,

    /// Percentage improvement per dimension per strategy
    /// (BTreeMap for deterministic iteration). Configured cells are merged
    /// over the defaults.
    #[serde(default = "default_effectiveness", deserialize_with = "merge_effectiveness")]
    pub effectiveness: BTreeMap<Dimension, BTreeMap<Strategy, f64>>,
}

fn default_primary_weight() -> f64 {
    0.7
}

fn default_secondary_weight() -> f64 {
    0.3
}

fn default_model_preference_bonus() -> f64 {
    5.0
}

fn default_effectiveness() -> BTreeMap<Dimension, BTreeMap<Strategy, f64>> {
    use Strategy::*;

    // Columns: retrieval grounding, instructional prompting, contextual
    // reframing, counter-narrative, neutral language substitution.
    let rows: [(Dimension, [f64; 5]); 5] = [
        (Dimension::Accuracy, [47.2, 20.1, 27.9, 18.0, 12.5]),
        (Dimension::Relevance, [58.1, 39.5, 37.6, 30.2, 22.4]),
        (Dimension::Fairness, [127.1, 113.6, 103.6, 96.8, 118.3]),
        (Dimension::Neutrality, [134.5, 128.4, 141.3, 88.7, 137.9]),
        (Dimension::Representation, [58.1, 86.5, 83.0, 79.4, 41.2]),
    ];
    let columns = [
        RetrievalGrounding,
        InstructionalPrompting,
        ContextualReframing,
        CounterNarrative,
        NeutralLanguageSubstitution,
    ];

    rows.into_iter()
        .map(|(dimension, values)| (dimension, columns.into_iter().zip(values).collect()))
        .collect()
}

fn merge_effectiveness<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<Dimension, BTreeMap<Strategy, f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<Dimension, BTreeMap<Strategy, f64>>::deserialize(deserializer)?;
    let mut matrix = default_effectiveness();
    for (dimension, row) in overrides {
        matrix.entry(dimension).or_default().extend(row);
    }
    Ok(matrix)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            primary_weight: 0.7,
            secondary_weight: 0.3,
            model_preference_bonus: 5.0,
            effectiveness: default_effectiveness(),
        }
    }
}

impl StrategyConfig {
    /// Expected improvement of `strategy` on `dimension`; zero when unlisted.
    pub fn effectiveness_of(&self, dimension: Dimension, strategy: Strategy) -> f64 {
        self.effectiveness
            .get(&dimension)
            .and_then(|row| row.get(&strategy))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Bias category classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// `overall` strictly below this counts as general bias when no
    /// specific category matched
    #[serde(default = "default_general_bias_below")]
    pub general_bias_below: f64,
}

fn default_general_bias_below() -> f64 {
    3.5
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            general_bias_below: 3.5,
        }
    }
}

/// Determinism configuration for reproducible results.
///
/// When `analyzed_at` is set, [`crate::Pipeline::process`] stamps every
/// result with it instead of the current system time:
///
/// ```yaml
/// determinism:
///   analyzed_at: "2025-01-15T10:00:00Z"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeterminismConfig {
    /// Fixed timestamp for analysis (ISO 8601)
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}
