//! # biaslens-core
//!
//! Deterministic bias scoring and mitigation engine for generated text
//! about the Sikh community.
//!
//! This crate answers three questions about a response:
//! - How does it score on accuracy, relevance, fairness, neutrality and representation?
//! - How close is it to known stereotype phrasing?
//! - What rewrite reduces the bias it carries?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same text always produces the same scores and rewrite
//! 2. **No model calls**: Scoring and mitigation are rule-based
//! 3. **Traceable**: Every penalty cites the rule id that fired
//! 4. **Bounded**: Dimension scores are clamped to 1.0..=5.0
//!
//! ## Example
//!
//! ```rust,ignore
//! use biaslens_core::{Mitigator, RubricScorer, TextScorer};
//!
//! let score = RubricScorer::new().score("All Sikhs are terrorists.");
//! println!("overall {:.1}, bias {:.1}", score.overall, score.bias_score);
//!
//! let record = Mitigator::new().mitigate("All Sikhs are terrorists.", None);
//! println!("{}: {}", record.strategy, record.rewritten_text);
//! ```

pub mod classify;
pub mod mitigator;
pub mod patterns;
pub mod rules;
pub mod scorer;
pub mod similarity;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use classify::{classify_bias, classify_prompt, Classifier};
pub use mitigator::{LayeredMitigation, Mitigator, StrategyInfo};
pub use rules::{Resolution, Rule, RuleSet, RuleSeverity, RuleSpec};
pub use scorer::{RubricScorer, TextScorer};
pub use similarity::{
    cosine_similarity, DisabledEmbedder, Embedder, EmbeddingError, HashingEmbedder,
    SeverityBands, SimilarityChecker, SimilarityConfig,
};
pub use types::{
    clamp_score, to_ten_point_scale, BiasCategory, Dimension, DimensionDetail, GroundingSource,
    MitigationRecord, ModelHint, PhraseMatch, PromptSubtype, RiskTier, ScoreRecord, SeverityTier,
    SimilarityRecord, Strategy, SCORE_MAX, SCORE_MIN,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const BIASED: &str = "All Sikhs are terrorists and should be feared.";

    #[test]
    fn test_mitigation_improves_fairness() {
        let scorer = RubricScorer::new();
        let before = scorer.score(BIASED);

        let record = Mitigator::new().mitigate(BIASED, Some(Strategy::NeutralLanguageSubstitution));
        let after = scorer.score(&record.rewritten_text);

        assert!(after.fairness > before.fairness);
        assert!(after.representation > before.representation);
    }

    #[test]
    fn test_biased_text_classified_representational() {
        let score = RubricScorer::new().score(BIASED);
        let checker = SimilarityChecker::new(
            Arc::new(HashingEmbedder::default()),
            SimilarityConfig::default(),
        );
        let similarity = checker.compute_similarity(BIASED);

        assert_eq!(
            classify_bias(BIASED, &score, &similarity, 3.5),
            BiasCategory::Representational
        );
    }

    #[test]
    fn test_score_record_serializes_snake_case() {
        let score = RubricScorer::new().score(BIASED);
        let json = serde_json::to_value(&score).unwrap();

        assert!(json.get("bias_score").is_some());
        assert_eq!(json["details"][0]["dimension"], "accuracy");
    }
}
