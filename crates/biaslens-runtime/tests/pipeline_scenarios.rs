//! End-to-end pipeline scenarios.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use biaslens_core::patterns::IDENTITY_GROUP_PATTERN;
use biaslens_core::{
    BiasCategory, Dimension, Embedder, EmbeddingError, RiskTier, RubricScorer, ScoreRecord,
    SeverityTier, Strategy, TextScorer,
};
use biaslens_runtime::{Pipeline, PipelineConfig, PipelineStage};

const BIASED: &str = "All Sikhs are terrorists and should be feared.";

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
}

struct CountingScorer {
    inner: RubricScorer,
    calls: Arc<AtomicUsize>,
}

impl TextScorer for CountingScorer {
    fn score(&self, text: &str) -> ScoreRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.score(text)
    }
}

struct UnavailableEmbedder;

impl Embedder for UnavailableEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model failed to load".to_string()))
    }

    fn dimensions(&self) -> usize {
        384
    }

    fn provider_name(&self) -> &str {
        "unavailable"
    }
}

#[test]
fn test_stereotyping_response_is_high_risk_and_improves() {
    let pipeline = Pipeline::with_defaults();
    let result = pipeline.process_at("Describe Sikhs.", BIASED, None, at());

    assert_eq!(result.risk_tier, RiskTier::High);
    assert!(matches!(
        result.mitigation.strategy,
        Strategy::RetrievalGrounding | Strategy::NeutralLanguageSubstitution
    ));
    assert!(result.mitigated_score.fairness >= result.original_score.fairness + 0.5);
    assert_eq!(result.bias_category, BiasCategory::Representational);
    assert!(result.recommendations.len() <= 5);
    assert!(!result.selection.reasoning.is_empty());
}

#[test]
fn test_stereotyping_response_selects_grounding() {
    let pipeline = Pipeline::with_defaults();
    let result = pipeline.process_at("Describe Sikhs.", BIASED, None, at());

    assert_eq!(result.selection.primary.dimension, Dimension::Fairness);
    assert_eq!(result.selection.secondary.dimension, Dimension::Neutrality);
    assert_eq!(result.mitigation.strategy, Strategy::RetrievalGrounding);
    let sources = result.mitigation.grounding_sources.as_ref().unwrap();
    assert_eq!(sources[0].source, "World Sikh Organization");
}

#[test]
fn test_every_dimension_meets_the_margin() {
    let pipeline = Pipeline::with_defaults();
    let margin = pipeline.config().improvement.min_margin;

    for response in [
        BIASED,
        "Sikhism is a branch of Islam.",
        "Sikhs gather at the gurdwara for langar and kirtan every week.",
        "",
    ] {
        let result = pipeline.process_at("q", response, None, at());
        for d in Dimension::ALL {
            let floor = (result.original_score.get(d) + margin).min(5.0);
            assert!(result.mitigated_score.get(d) >= floor, "{} on {:?}", d, response);
        }
    }
}

#[test]
fn test_response_without_group_terms() {
    let pipeline = Pipeline::with_defaults();
    let result = pipeline.process_at(
        "What's the forecast?",
        "The weather will be sunny with a light breeze this afternoon.",
        None,
        at(),
    );

    assert_eq!(result.original_score.relevance, 1.0);
    assert_eq!(result.bias_category, BiasCategory::None);
}

#[test]
fn test_relevance_and_category_agree_on_group_vocabulary() {
    let pipeline = Pipeline::with_defaults();

    for response in [
        "Langar is served daily and seva is encouraged by the sangat.",
        "Kirtan fills the hall before the Granth is closed for the night.",
        "Volunteers served free meals at the community kitchen and sang hymns together.",
        "The weather will be sunny with a light breeze this afternoon.",
    ] {
        let result = pipeline.process_at("q", response, None, at());
        let names_group = IDENTITY_GROUP_PATTERN.is_match(response);

        assert_eq!(result.original_score.relevance > 1.0, names_group, "{}", response);
        if !names_group {
            assert_eq!(result.original_score.relevance, 1.0);
            assert_eq!(result.bias_category, BiasCategory::None);
        }
    }
}

#[test]
fn test_identical_requests_hit_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let scorer = CountingScorer {
        inner: RubricScorer::new(),
        calls: Arc::clone(&calls),
    };
    let pipeline = Pipeline::builder().scorer(Arc::new(scorer)).build().unwrap();

    let first = pipeline.process_at("Describe Sikhs.", BIASED, Some("gpt-4"), at());
    let after_first = calls.load(Ordering::SeqCst);
    let second = pipeline.process_at("Describe Sikhs.", BIASED, Some("gpt-4"), at());

    assert_eq!(after_first, 2);
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
    assert!(Arc::ptr_eq(&first, &second));

    let stats = pipeline.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    // a different model hint is a different key
    pipeline.process_at("Describe Sikhs.", BIASED, Some("claude-3"), at());
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    pipeline.clear_cache();
    pipeline.process_at("Describe Sikhs.", BIASED, Some("gpt-4"), at());
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[test]
fn test_unavailable_embedder_still_finalizes() {
    let pipeline = Pipeline::builder()
        .embedder(Arc::new(UnavailableEmbedder))
        .build()
        .unwrap();
    let result = pipeline.process_at("Describe Sikhs.", BIASED, None, at());

    assert_eq!(result.similarity.max_similarity, 0.0);
    assert_eq!(result.similarity.severity_tier, SeverityTier::None);
    assert!(result.similarity.matched_phrases.is_empty());
    assert_eq!(result.stages.last(), Some(&PipelineStage::Finalized));
    assert_eq!(result.degradations.len(), 1);
    assert_eq!(result.degradations[0].stage, PipelineStage::SimilarityChecked);
    // the rubric alone still escalates
    assert_eq!(result.risk_tier, RiskTier::High);
}

#[test]
fn test_configured_timestamp_is_used() {
    let mut config = PipelineConfig::default();
    config.determinism.analyzed_at = Some(at());
    let pipeline = Pipeline::builder().config(config).build().unwrap();

    let result = pipeline.process("q", "Sikhs pray.", None);
    assert_eq!(result.analyzed_at, at());
}

#[test]
fn test_single_effectiveness_override_keeps_selection_meaningful() {
    let config = PipelineConfig::from_yaml(
        r#"
strategy:
  effectiveness:
    fairness:
      counter_narrative: 1.0
"#,
    )
    .unwrap();
    let pipeline = Pipeline::builder().config(config).build().unwrap();
    let result = pipeline.process_at("Describe Sikhs.", BIASED, None, at());

    assert_eq!(result.mitigation.strategy, Strategy::RetrievalGrounding);
    assert!((result.selection.expected_effectiveness - 129.32).abs() < 1e-9);
}

#[test]
fn test_cache_capacity_is_bounded() {
    let mut config = PipelineConfig::default();
    config.cache.capacity = 2;
    let pipeline = Pipeline::builder().config(config).build().unwrap();

    let pairs = [("q", "one"), ("q", "two"), ("q", "three")];
    let results = pipeline.process_batch(&pairs, None);

    assert_eq!(results.len(), 3);
    assert_eq!(pipeline.cache_stats().size, 2);
}

#[test]
fn test_concurrent_callers_share_the_cache() {
    let pipeline = Arc::new(Pipeline::with_defaults());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.process_at("Describe Sikhs.", BIASED, None, at()))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.windows(2).all(|w| *w[0] == *w[1]));
    assert_eq!(pipeline.cache_stats().size, 1);
}

#[test]
fn test_result_serializes() {
    let pipeline = Pipeline::with_defaults();
    let result = pipeline.process_at("Describe Sikhs.", BIASED, Some("gemini"), at());
    let json = serde_json::to_value(&*result).unwrap();

    assert_eq!(json["risk_tier"], "high");
    assert_eq!(json["model"], "gemini");
    assert_eq!(json["stages"][9], "finalized");
    assert_eq!(json["analyzed_at"], "2025-01-15T10:00:00Z");
}
