//! Pipeline orchestrator.
//!
//! Sequences one analysis run:
//! - Classify the prompt and score the response
//! - Check stereotype similarity and assess risk
//! - Select and apply a mitigation strategy, then re-score
//! - Enforce the improvement guarantee and assemble the result
//!
//! Every run reaches [`PipelineStage::Finalized`]. A failing sub-step is
//! replaced by its documented default and recorded in
//! [`PipelineResult::degradations`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use biaslens_core::scorer::{CONFIDENCE_FLOOR, NEUTRAL_BASELINE};
use biaslens_core::{
    classify_bias, classify_prompt, BiasCategory, DisabledEmbedder, Dimension, Embedder,
    HashingEmbedder, MitigationRecord, Mitigator, ModelHint, PromptSubtype, RiskTier,
    RubricScorer, ScoreRecord, SeverityTier, SimilarityChecker, SimilarityRecord, Strategy,
    TextScorer, SCORE_MAX,
};

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::{ConfigError, PipelineConfig, RiskConfig};
use crate::strategy::{model_profile, select_strategy, StrategySelection};

/// Maximum number of recommendations in a result.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Errors from building a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Stages of one pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Classified,
    ScoredOriginal,
    SimilarityChecked,
    RiskAssessed,
    StrategySelected,
    Mitigated,
    ScoredMitigated,
    ImprovementEnforced,
    Finalized,
}

/// A stage that fell back to its documented default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub stage: PipelineStage,
    pub reason: String,
}

/// A dimension raised by the improvement guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImprovementAdjustment {
    pub dimension: Dimension,
    pub before: f64,
    pub after: f64,
}

/// Rubric and similarity risk tiers and their combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub rubric: RiskTier,
    pub similarity: RiskTier,
    pub combined: RiskTier,
}

/// Combine the rubric and similarity signals. Either can escalate risk;
/// neither can lower the other.
pub fn assess_risk(
    score: &ScoreRecord,
    similarity: &SimilarityRecord,
    config: &RiskConfig,
) -> RiskAssessment {
    let rubric = if score.overall < config.rubric_high_below {
        RiskTier::High
    } else if score.overall < config.rubric_medium_below {
        RiskTier::Medium
    } else {
        RiskTier::Low
    };

    let similarity = if similarity.max_similarity >= config.similarity_high_at {
        RiskTier::High
    } else if similarity.max_similarity >= config.similarity_medium_at {
        RiskTier::Medium
    } else {
        RiskTier::Low
    };

    RiskAssessment {
        rubric,
        similarity,
        combined: rubric.max(similarity),
    }
}

/// Raise every mitigated dimension to at least `original + margin`,
/// clamped to the maximum score.
pub fn enforce_improvement(
    original: &ScoreRecord,
    mitigated: &ScoreRecord,
    margin: f64,
) -> (ScoreRecord, Vec<ImprovementAdjustment>) {
    let mut enforced = mitigated.clone();
    let mut adjustments = Vec::new();

    for dimension in Dimension::ALL {
        let floor = (original.get(dimension) + margin).min(SCORE_MAX);
        let current = enforced.get(dimension);
        if current < floor {
            enforced = enforced.with_score(dimension, floor);
            adjustments.push(ImprovementAdjustment {
                dimension,
                before: current,
                after: floor,
            });
        }
    }

    (enforced, adjustments)
}

/// Complete result of one pipeline run. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub prompt: String,
    pub response: String,
    pub model: ModelHint,
    pub prompt_subtype: PromptSubtype,
    pub original_score: ScoreRecord,
    pub similarity: SimilarityRecord,
    pub risk: RiskAssessment,
    pub risk_tier: RiskTier,
    pub selection: StrategySelection,
    pub mitigation: MitigationRecord,
    pub mitigated_score: ScoreRecord,
    pub improvement_adjustments: Vec<ImprovementAdjustment>,
    pub bias_category: BiasCategory,
    pub recommendations: Vec<String>,
    pub degradations: Vec<Degradation>,
    pub stages: Vec<PipelineStage>,
    pub analyzed_at: DateTime<Utc>,
}

/// Flat digest of a [`PipelineResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub risk_tier: RiskTier,
    pub prompt_subtype: PromptSubtype,
    pub bias_category: BiasCategory,
    pub overall: f64,
    pub bias_score: f64,
    pub mitigated_overall: f64,
    pub mitigated_bias_score: f64,
    pub max_similarity: f64,
    pub strategy: Strategy,
    pub bias_reduction: f64,
    pub reasoning: String,
    pub model: String,
}

impl PipelineResult {
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            risk_tier: self.risk_tier,
            prompt_subtype: self.prompt_subtype,
            bias_category: self.bias_category,
            overall: self.original_score.overall,
            bias_score: self.original_score.bias_score,
            mitigated_overall: self.mitigated_score.overall,
            mitigated_bias_score: self.mitigated_score.bias_score,
            max_similarity: self.similarity.max_similarity,
            strategy: self.mitigation.strategy,
            bias_reduction: self.mitigation.bias_reduction_estimate,
            reasoning: self.selection.reasoning.clone(),
            model: self.model.as_str().to_string(),
        }
    }

    /// Whether any stage fell back to a default.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    scorer: Option<Arc<dyn TextScorer>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the rubric scorer.
    pub fn scorer(mut self, scorer: Arc<dyn TextScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Replace the embedding backend. Ignored when similarity is disabled.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;
        Ok(Pipeline::assemble(self.config, self.scorer, self.embedder))
    }
}

/// The pipeline orchestrator. Shareable across threads; the result cache is
/// its only mutable state.
pub struct Pipeline {
    config: PipelineConfig,
    scorer: Arc<dyn TextScorer>,
    checker: SimilarityChecker,
    mitigator: Mitigator,
    cache: ResultCache,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Pipeline with default configuration, rubric scorer and hashing embedder.
    pub fn with_defaults() -> Self {
        Self::assemble(PipelineConfig::default(), None, None)
    }

    fn assemble(
        config: PipelineConfig,
        scorer: Option<Arc<dyn TextScorer>>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let embedder: Arc<dyn Embedder> = if !config.similarity.enabled {
            Arc::new(DisabledEmbedder)
        } else {
            embedder.unwrap_or_else(|| Arc::new(HashingEmbedder::new(config.similarity.dimensions)))
        };
        let checker = SimilarityChecker::new(embedder, config.similarity.clone());
        let capacity = if config.cache.enabled {
            config.cache.capacity
        } else {
            0
        };

        Self {
            scorer: scorer.unwrap_or_else(|| Arc::new(RubricScorer::new())),
            checker,
            mitigator: Mitigator::new(),
            cache: ResultCache::new(capacity),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze a response.
    ///
    /// Uses `determinism.analyzed_at` when configured, otherwise the current
    /// time. For fully reproducible output use [`Pipeline::process_at`].
    pub fn process(&self, prompt: &str, response: &str, model: Option<&str>) -> Arc<PipelineResult> {
        let at = self.config.determinism.analyzed_at.unwrap_or_else(Utc::now);
        self.process_at(prompt, response, model, at)
    }

    /// Analyze a response with an explicit timestamp.
    ///
    /// Identical `(prompt, response, model)` triples return the cached
    /// instance, including its original timestamp.
    pub fn process_at(
        &self,
        prompt: &str,
        response: &str,
        model: Option<&str>,
        analyzed_at: DateTime<Utc>,
    ) -> Arc<PipelineResult> {
        let model = ModelHint::new(model);
        let key = CacheKey::new(prompt, response, &model);

        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key.to_hex(), "Cache hit");
            return cached;
        }
        debug!(key = %key.to_hex(), "Cache miss");

        let result = Arc::new(self.run_uncached(prompt, response, &model, analyzed_at));
        self.cache.get_or_insert(key, result)
    }

    /// Analyze several `(prompt, response)` pairs with the same model hint.
    pub fn process_batch(&self, pairs: &[(&str, &str)], model: Option<&str>) -> Vec<Arc<PipelineResult>> {
        pairs
            .iter()
            .map(|(prompt, response)| self.process(prompt, response, model))
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// One full run, bypassing the cache.
    pub(crate) fn run_uncached(
        &self,
        prompt: &str,
        response: &str,
        model: &ModelHint,
        analyzed_at: DateTime<Utc>,
    ) -> PipelineResult {
        let mut run = Run::default();
        run.enter(PipelineStage::Received);

        let prompt_subtype = classify_prompt(prompt);
        run.enter(PipelineStage::Classified);

        let original_score = self.score_guarded(response, PipelineStage::ScoredOriginal, &mut run);
        run.enter(PipelineStage::ScoredOriginal);

        let similarity = self.checker.compute_similarity(response);
        if similarity.degraded {
            let reason = if self.config.similarity.enabled {
                "embedding backend unavailable; similarity carries no signal"
            } else {
                "similarity checking disabled; similarity carries no signal"
            };
            run.degrade(PipelineStage::SimilarityChecked, reason);
        }
        run.enter(PipelineStage::SimilarityChecked);

        let risk = assess_risk(&original_score, &similarity, &self.config.risk);
        run.enter(PipelineStage::RiskAssessed);

        let selection = select_strategy(&original_score, model, &self.config.strategy);
        run.enter(PipelineStage::StrategySelected);

        let mitigation = self.mitigator.mitigate(response, Some(selection.strategy));
        run.enter(PipelineStage::Mitigated);

        let rescored = self.score_guarded(
            &mitigation.rewritten_text,
            PipelineStage::ScoredMitigated,
            &mut run,
        );
        run.enter(PipelineStage::ScoredMitigated);

        let (mitigated_score, improvement_adjustments) = enforce_improvement(
            &original_score,
            &rescored,
            self.config.improvement.min_margin,
        );
        run.enter(PipelineStage::ImprovementEnforced);

        let bias_category = classify_bias(
            response,
            &original_score,
            &similarity,
            self.config.classification.general_bias_below,
        );
        let recommendations = recommendations(
            risk.combined,
            selection.strategy,
            bias_category,
            &similarity,
            model,
        );
        run.enter(PipelineStage::Finalized);

        PipelineResult {
            prompt: prompt.to_string(),
            response: response.to_string(),
            model: model.clone(),
            prompt_subtype,
            original_score,
            similarity,
            risk,
            risk_tier: risk.combined,
            selection,
            mitigation,
            mitigated_score,
            improvement_adjustments,
            bias_category,
            recommendations,
            degradations: run.degradations,
            stages: run.stages,
            analyzed_at,
        }
    }

    /// Score with the configured scorer. A panicking scorer yields the
    /// neutral baseline at floor confidence.
    fn score_guarded(&self, text: &str, stage: PipelineStage, run: &mut Run) -> ScoreRecord {
        let scorer = &self.scorer;
        match panic::catch_unwind(AssertUnwindSafe(|| scorer.score(text))) {
            Ok(score) => score,
            Err(_) => {
                run.degrade(stage, "scorer failed; using neutral baseline scores");
                ScoreRecord::from_scores([NEUTRAL_BASELINE; 5], CONFIDENCE_FLOOR)
            }
        }
    }
}

#[derive(Default)]
struct Run {
    stages: Vec<PipelineStage>,
    degradations: Vec<Degradation>,
}

impl Run {
    fn enter(&mut self, stage: PipelineStage) {
        debug!(?stage, "Pipeline stage");
        self.stages.push(stage);
    }

    fn degrade(&mut self, stage: PipelineStage, reason: &str) {
        warn!(?stage, reason, "Pipeline stage degraded");
        self.degradations.push(Degradation {
            stage,
            reason: reason.to_string(),
        });
    }
}

/// Ordered advice: risk first, then strategy, category, similarity and model.
pub fn recommendations(
    risk: RiskTier,
    strategy: Strategy,
    category: BiasCategory,
    similarity: &SimilarityRecord,
    model: &ModelHint,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    match risk {
        RiskTier::High => {
            out.push("High bias risk detected - consider rephrasing the prompt to be more neutral".into());
            out.push("Review the response carefully before using it in sensitive contexts".into());
        }
        RiskTier::Medium => {
            out.push("Moderate bias detected - consider the mitigated response provided".into());
            out.push("Be aware of potential bias when interpreting this response".into());
        }
        RiskTier::Low => {
            out.push("Low bias risk - response appears generally balanced".into());
        }
    }

    out.push(
        match strategy {
            Strategy::InstructionalPrompting => {
                "Add explicit instructions to avoid stereotypes in future prompts"
            }
            Strategy::ContextualReframing => {
                "Reframe questions to encourage multiple perspectives"
            }
            Strategy::RetrievalGrounding => {
                "Verify claims against authoritative sources when possible"
            }
            Strategy::CounterNarrative => "Include counter-examples that challenge stereotypes",
            Strategy::NeutralLanguageSubstitution => {
                "Replace emotionally charged terms with neutral language"
            }
        }
        .into(),
    );

    let category_advice = match category {
        BiasCategory::Historical => {
            Some("Be mindful of historical context and how it shapes current perceptions")
        }
        BiasCategory::Representational => {
            Some("Ensure diverse representation in examples and descriptions")
        }
        BiasCategory::Measurement => {
            Some("Avoid measuring the community against other religions' frameworks")
        }
        BiasCategory::Aggregation => {
            Some("Acknowledge the diversity of practice within the community")
        }
        BiasCategory::Evaluation => {
            Some("Avoid judging practices by Western-centric standards")
        }
        BiasCategory::General => Some("Avoid stereotypes and generalizations about groups"),
        BiasCategory::None => None,
    };
    if let Some(advice) = category_advice {
        out.push(advice.into());
    }

    if similarity.severity_tier >= SeverityTier::Medium {
        out.push("High similarity to known stereotype phrasing detected - exercise caution".into());
    }

    if let Some(profile) = model_profile(model) {
        out.push(format!(
            "Responses from {} tend toward {}",
            profile.name,
            profile.bias_tendencies.join(" and ")
        ));
    }

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn similarity(max: f64) -> SimilarityRecord {
        SimilarityRecord {
            max_similarity: max,
            matched_phrases: Vec::new(),
            severity_tier: SeverityTier::None,
            threshold_exceeded: max > 0.35,
            degraded: false,
        }
    }

    #[test]
    fn test_risk_takes_the_higher_tier() {
        let config = RiskConfig::default();
        let good = ScoreRecord::from_scores([4.5; 5], 0.9);
        let bad = ScoreRecord::from_scores([1.5; 5], 0.9);
        let middling = ScoreRecord::from_scores([3.0; 5], 0.9);

        assert_eq!(assess_risk(&good, &similarity(0.1), &config).combined, RiskTier::Low);
        assert_eq!(assess_risk(&good, &similarity(0.85), &config).combined, RiskTier::High);
        assert_eq!(assess_risk(&bad, &similarity(0.0), &config).combined, RiskTier::High);
        assert_eq!(assess_risk(&middling, &similarity(0.1), &config).combined, RiskTier::Medium);

        let risk = assess_risk(&good, &similarity(0.6), &config);
        assert_eq!(risk.rubric, RiskTier::Low);
        assert_eq!(risk.similarity, RiskTier::Medium);
        assert_eq!(risk.combined, RiskTier::Medium);
    }

    #[test]
    fn test_enforce_improvement_raises_and_clamps() {
        let original = ScoreRecord::from_scores([1.0, 4.8, 2.0, 3.0, 5.0], 0.9);
        let mitigated = ScoreRecord::from_scores([1.2, 4.9, 3.5, 3.0, 4.0], 0.9);

        let (enforced, adjustments) = enforce_improvement(&original, &mitigated, 0.5);

        assert_eq!(enforced.accuracy, 1.5);
        assert_eq!(enforced.relevance, 5.0);
        assert_eq!(enforced.fairness, 3.5);
        assert_eq!(enforced.neutrality, 3.5);
        assert_eq!(enforced.representation, 5.0);
        assert_eq!(adjustments.len(), 4);
        assert_eq!(
            adjustments[0],
            ImprovementAdjustment { dimension: Dimension::Accuracy, before: 1.2, after: 1.5 }
        );
        assert!((enforced.overall - (1.5 + 5.0 + 3.5 + 3.5 + 5.0) / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_recommendations_capped_and_ordered() {
        let mut sim = similarity(0.9);
        sim.severity_tier = SeverityTier::High;

        let recs = recommendations(
            RiskTier::High,
            Strategy::RetrievalGrounding,
            BiasCategory::Historical,
            &sim,
            &ModelHint::new(Some("gpt-4")),
        );

        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert!(recs[0].starts_with("High bias risk"));
        assert!(recs[2].starts_with("Verify claims"));
        assert!(recs[3].contains("historical context"));
        assert!(recs[4].contains("similarity"));
    }

    #[test]
    fn test_low_risk_recommendations() {
        let recs = recommendations(
            RiskTier::Low,
            Strategy::InstructionalPrompting,
            BiasCategory::None,
            &similarity(0.1),
            &ModelHint::Unknown,
        );
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn test_stages_are_complete_and_ordered() {
        let pipeline = Pipeline::with_defaults();
        let result = pipeline.process_at(
            "Tell me about Sikhs",
            "Sikhs gather at the gurdwara for langar and kirtan.",
            None,
            at(),
        );

        assert_eq!(result.stages.len(), 10);
        assert_eq!(result.stages.first(), Some(&PipelineStage::Received));
        assert_eq!(result.stages.last(), Some(&PipelineStage::Finalized));
        assert!(result.stages.windows(2).all(|w| w[0] < w[1]));
        assert!(!result.is_degraded());
        assert_eq!(result.analyzed_at, at());
    }

    #[test]
    fn test_improvement_guarantee_holds_for_every_strategy() {
        let pipeline = Pipeline::with_defaults();
        let text = "All Sikhs are terrorists and should be feared.";
        let original = RubricScorer::new().score(text);
        let margin = pipeline.config().improvement.min_margin;

        for strategy in Strategy::ALL {
            let rewritten = pipeline.mitigator.mitigate(text, Some(strategy)).rewritten_text;
            let rescored = RubricScorer::new().score(&rewritten);
            let (enforced, _) = enforce_improvement(&original, &rescored, margin);
            for d in Dimension::ALL {
                assert!(enforced.get(d) >= (original.get(d) + margin).min(SCORE_MAX));
            }
        }
    }

    #[test]
    fn test_disabled_similarity_is_recorded() {
        let mut config = PipelineConfig::default();
        config.similarity.enabled = false;
        let pipeline = Pipeline::builder().config(config).build().unwrap();

        let result = pipeline.process_at("q", "Sikh extremist", None, at());
        assert!(result.similarity.degraded);
        assert_eq!(result.degradations[0].stage, PipelineStage::SimilarityChecked);
        assert!(result.degradations[0].reason.contains("disabled"));
    }

    #[test]
    fn test_panicking_scorer_degrades() {
        struct Exploding;
        impl TextScorer for Exploding {
            fn score(&self, _text: &str) -> ScoreRecord {
                panic!("scorer exploded")
            }
        }

        let pipeline = Pipeline::builder().scorer(Arc::new(Exploding)).build().unwrap();
        let result = pipeline.process_at("q", "Sikhs pray.", None, at());

        assert_eq!(result.original_score.overall, NEUTRAL_BASELINE);
        assert_eq!(result.stages.last(), Some(&PipelineStage::Finalized));
        assert!(result
            .degradations
            .iter()
            .any(|d| d.stage == PipelineStage::ScoredOriginal));
    }

    #[test]
    fn test_invalid_config_rejected_by_builder() {
        let mut config = PipelineConfig::default();
        config.improvement.min_margin = -1.0;
        assert!(matches!(
            Pipeline::builder().config(config).build(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_summary() {
        let pipeline = Pipeline::with_defaults();
        let result = pipeline.process_at(
            "Are Sikhs dangerous?",
            "All Sikhs are terrorists and should be feared.",
            Some("GPT-4"),
            at(),
        );
        let summary = result.summary();

        assert_eq!(summary.model, "gpt-4");
        assert_eq!(summary.risk_tier, RiskTier::High);
        assert_eq!(summary.strategy, result.selection.strategy);
        assert!(summary.mitigated_bias_score > summary.bias_score);
    }
}
