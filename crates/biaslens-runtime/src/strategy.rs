//! Strategy selection from the effectiveness matrix.
//!
//! The two weakest rubric dimensions are combined with the configured
//! weights; the strategy with the highest weighted effectiveness wins.
//! Ties go to the earlier strategy in [`Strategy::PRIORITY`].

use serde::Serialize;

use biaslens_core::{Dimension, ModelHint, ScoreRecord, Strategy};

use crate::config::StrategyConfig;

/// Known generator profile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelProfile {
    pub name: &'static str,
    pub bias_tendencies: &'static [&'static str],
    pub preferred_strategies: &'static [Strategy],
}

pub const MODEL_PROFILES: &[ModelProfile] = &[
    ModelProfile {
        name: "gpt-4",
        bias_tendencies: &["religious conflation", "harmful generalizations"],
        preferred_strategies: &[Strategy::RetrievalGrounding, Strategy::ContextualReframing],
    },
    ModelProfile {
        name: "gpt-3.5-turbo",
        bias_tendencies: &["terrorism association", "emotional language"],
        preferred_strategies: &[
            Strategy::NeutralLanguageSubstitution,
            Strategy::InstructionalPrompting,
        ],
    },
    ModelProfile {
        name: "claude-3",
        bias_tendencies: &["cultural bias", "factual errors"],
        preferred_strategies: &[Strategy::CounterNarrative, Strategy::RetrievalGrounding],
    },
    ModelProfile {
        name: "claude-2",
        bias_tendencies: &["religious conflation", "emotional language"],
        preferred_strategies: &[
            Strategy::RetrievalGrounding,
            Strategy::NeutralLanguageSubstitution,
        ],
    },
    ModelProfile {
        name: "llama-2",
        bias_tendencies: &["terrorism association", "harmful generalizations"],
        preferred_strategies: &[
            Strategy::NeutralLanguageSubstitution,
            Strategy::ContextualReframing,
        ],
    },
    ModelProfile {
        name: "gemini",
        bias_tendencies: &["factual errors", "cultural bias"],
        preferred_strategies: &[Strategy::RetrievalGrounding, Strategy::CounterNarrative],
    },
];

/// Profile for a model hint. Matches exact names and versioned variants
/// such as `claude-3-opus`.
pub fn model_profile(hint: &ModelHint) -> Option<&'static ModelProfile> {
    match hint {
        ModelHint::Unknown => None,
        ModelHint::Named(name) => MODEL_PROFILES.iter().find(|p| {
            name == p.name
                || name
                    .strip_prefix(p.name)
                    .map(|rest| rest.starts_with(['-', ' ', '.', '_']))
                    .unwrap_or(false)
        }),
    }
}

/// A weak rubric dimension and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeakDimension {
    pub dimension: Dimension,
    pub score: f64,
}

/// Combined effectiveness of one candidate strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateScore {
    pub strategy: Strategy,
    pub combined: f64,
    pub model_bonus: f64,
}

impl CandidateScore {
    pub fn total(&self) -> f64 {
        self.combined + self.model_bonus
    }
}

/// Outcome of strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySelection {
    pub primary: WeakDimension,
    pub secondary: WeakDimension,
    /// Every strategy in priority order
    pub candidates: Vec<CandidateScore>,
    pub strategy: Strategy,
    /// Combined effectiveness of the chosen strategy, in percent
    pub expected_effectiveness: f64,
    pub reasoning: String,
}

/// Choose the strategy with the highest weighted effectiveness over the two
/// weakest dimensions.
pub fn select_strategy(
    score: &ScoreRecord,
    model: &ModelHint,
    config: &StrategyConfig,
) -> StrategySelection {
    let ranked = score.ranked_dimensions();
    let primary = WeakDimension {
        dimension: ranked[0].0,
        score: ranked[0].1,
    };
    let secondary = WeakDimension {
        dimension: ranked[1].0,
        score: ranked[1].1,
    };

    let profile = model_profile(model);
    let weight_sum = config.primary_weight + config.secondary_weight;

    let candidates: Vec<CandidateScore> = Strategy::PRIORITY
        .iter()
        .map(|&strategy| {
            let weighted = config.effectiveness_of(primary.dimension, strategy)
                * config.primary_weight
                + config.effectiveness_of(secondary.dimension, strategy) * config.secondary_weight;
            let model_bonus = match profile {
                Some(p) if p.preferred_strategies.contains(&strategy) => {
                    config.model_preference_bonus
                }
                _ => 0.0,
            };
            CandidateScore {
                strategy,
                combined: if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 },
                model_bonus,
            }
        })
        .collect();

    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.total() > best.total() {
            best = *candidate;
        }
    }

    let mut reasoning = format!(
        "{} shows {:.1}% combined effectiveness for primary weakness ({}: {:.1}/5) and secondary weakness ({}: {:.1}/5).",
        best.strategy,
        best.combined,
        primary.dimension,
        primary.score,
        secondary.dimension,
        secondary.score,
    );
    if best.model_bonus > 0.0 {
        if let Some(p) = profile {
            reasoning.push_str(&format!(" Preferred for {} responses.", p.name));
        }
    }

    StrategySelection {
        primary,
        secondary,
        candidates,
        strategy: best.strategy,
        expected_effectiveness: best.combined,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_score() -> ScoreRecord {
        // accuracy, relevance, fairness, neutrality, representation
        ScoreRecord::from_scores([3.0, 2.5, 1.0, 1.0, 1.0], 0.9)
    }

    #[test]
    fn test_two_weakest_dimensions_drive_selection() {
        let selection = select_strategy(&scenario_score(), &ModelHint::Unknown, &StrategyConfig::default());

        assert_eq!(selection.primary.dimension, Dimension::Fairness);
        assert_eq!(selection.secondary.dimension, Dimension::Neutrality);
        assert_eq!(selection.strategy, Strategy::RetrievalGrounding);
        assert!((selection.expected_effectiveness - 129.32).abs() < 1e-9);
    }

    #[test]
    fn test_reasoning_names_both_weaknesses() {
        let selection = select_strategy(&scenario_score(), &ModelHint::Unknown, &StrategyConfig::default());

        assert_eq!(
            selection.reasoning,
            "Retrieval Grounding shows 129.3% combined effectiveness for primary weakness \
             (fairness: 1.0/5) and secondary weakness (neutrality: 1.0/5)."
        );
    }

    #[test]
    fn test_neutrality_weakness_prefers_reframing() {
        let score = ScoreRecord::from_scores([4.0, 4.0, 4.0, 1.0, 2.0], 0.9);
        let selection = select_strategy(&score, &ModelHint::Unknown, &StrategyConfig::default());

        // CR: 141.3*0.7 + 83.0*0.3 = 123.81 beats RG: 134.5*0.7 + 58.1*0.3 = 111.58
        assert_eq!(selection.primary.dimension, Dimension::Neutrality);
        assert_eq!(selection.secondary.dimension, Dimension::Representation);
        assert_eq!(selection.strategy, Strategy::ContextualReframing);
    }

    #[test]
    fn test_model_preference_can_change_the_choice() {
        let mut config = StrategyConfig::default();
        config.model_preference_bonus = 10.0;

        let selection = select_strategy(&scenario_score(), &ModelHint::new(Some("gpt-3.5-turbo")), &config);

        // NLS 124.18 + 10 beats RG 129.32
        assert_eq!(selection.strategy, Strategy::NeutralLanguageSubstitution);
        assert!(selection.reasoning.ends_with("Preferred for gpt-3.5-turbo responses."));
        assert!((selection.expected_effectiveness - 124.18).abs() < 1e-9);
    }

    #[test]
    fn test_ties_follow_priority_order() {
        let mut config = StrategyConfig::default();
        for row in config.effectiveness.values_mut() {
            for value in row.values_mut() {
                *value = 50.0;
            }
        }
        let selection = select_strategy(&scenario_score(), &ModelHint::Unknown, &config);

        assert_eq!(selection.strategy, Strategy::PRIORITY[0]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let config = StrategyConfig::default();
        let model = ModelHint::new(Some("Claude-3"));
        assert_eq!(
            select_strategy(&scenario_score(), &model, &config),
            select_strategy(&scenario_score(), &model, &config)
        );
    }

    #[test]
    fn test_model_profile_lookup() {
        assert_eq!(model_profile(&ModelHint::new(Some("GPT-4"))).map(|p| p.name), Some("gpt-4"));
        assert_eq!(
            model_profile(&ModelHint::new(Some("claude-3-opus"))).map(|p| p.name),
            Some("claude-3")
        );
        assert!(model_profile(&ModelHint::new(Some("gpt-40"))).is_none());
        assert!(model_profile(&ModelHint::Unknown).is_none());
        assert!(model_profile(&ModelHint::new(Some("mistral"))).is_none());
    }
}
