//! Data-driven rule engine.
//!
//! A rule table is an ordered list of [`RuleSpec`] entries compiled into a
//! [`RuleSet`]. Scoring code never branches on individual patterns; it asks
//! the rule set for matches, penalties or a tiered resolution.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How severe a rule is when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    /// Floors the dimension immediately
    Critical,
    /// Large fixed penalty
    Major,
    /// Small penalty
    Minor,
    /// Positive evidence, raises the score
    Supporting,
}

impl RuleSeverity {
    pub fn is_harmful(&self) -> bool {
        !matches!(self, RuleSeverity::Supporting)
    }
}

/// Static description of a rule, suitable for `const` tables.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub id: &'static str,
    pub pattern: &'static str,
    pub category: &'static str,
    pub severity: RuleSeverity,
    pub weight: f64,
    pub explanation: &'static str,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: &'static str,
    pub pattern: Regex,
    pub category: &'static str,
    pub severity: RuleSeverity,
    pub weight: f64,
    pub explanation: &'static str,
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            id: spec.id,
            pattern: Regex::new(spec.pattern)?,
            category: spec.category,
            severity: spec.severity,
            weight: spec.weight,
            explanation: spec.explanation,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Number of non-overlapping occurrences in `text`.
    pub fn occurrences(&self, text: &str) -> usize {
        self.pattern.find_iter(text).count()
    }
}

/// Tagged outcome of an ordered severity scan.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Critical(&'a Rule),
    Major(&'a Rule),
    Minor(&'a Rule),
    Clear,
}

impl<'a> Resolution<'a> {
    pub fn rule(&self) -> Option<&'a Rule> {
        match self {
            Resolution::Critical(rule) | Resolution::Major(rule) | Resolution::Minor(rule) => {
                Some(rule)
            }
            Resolution::Clear => None,
        }
    }
}

/// An ordered list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a rule table. Order is preserved.
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, regex::Error> {
        let rules = specs.iter().map(Rule::compile).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// First rule in table order that matches.
    pub fn first_match(&self, text: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.is_match(text))
    }

    /// Every rule that matches, in table order.
    pub fn matches(&self, text: &str) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.is_match(text)).collect()
    }

    pub fn any_match(&self, text: &str) -> bool {
        self.rules.iter().any(|r| r.is_match(text))
    }

    /// Number of distinct rules that match.
    pub fn count_matches(&self, text: &str) -> usize {
        self.rules.iter().filter(|r| r.is_match(text)).count()
    }

    /// Total occurrences across all rules.
    pub fn count_occurrences(&self, text: &str) -> usize {
        self.rules.iter().map(|r| r.occurrences(text)).sum()
    }

    /// Sum of weights of matching harmful rules.
    pub fn penalty(&self, text: &str) -> f64 {
        self.rules
            .iter()
            .filter(|r| r.severity.is_harmful() && r.is_match(text))
            .map(|r| r.weight)
            .sum()
    }

    /// Sum of weights of matching supporting rules.
    pub fn reward(&self, text: &str) -> f64 {
        self.rules
            .iter()
            .filter(|r| !r.severity.is_harmful() && r.is_match(text))
            .map(|r| r.weight)
            .sum()
    }

    /// Number of supporting rules that match.
    pub fn supporting_count(&self, text: &str) -> usize {
        self.rules
            .iter()
            .filter(|r| !r.severity.is_harmful() && r.is_match(text))
            .count()
    }

    /// Single ordered scan over harmful rules; the first match decides the tier.
    ///
    /// Tables are expected to list critical rules before major before minor.
    pub fn resolve(&self, text: &str) -> Resolution<'_> {
        for rule in &self.rules {
            if !rule.severity.is_harmful() || !rule.is_match(text) {
                continue;
            }
            return match rule.severity {
                RuleSeverity::Critical => Resolution::Critical(rule),
                RuleSeverity::Major => Resolution::Major(rule),
                RuleSeverity::Minor => Resolution::Minor(rule),
                RuleSeverity::Supporting => continue,
            };
        }
        Resolution::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[RuleSpec] = &[
        RuleSpec {
            id: "crit",
            pattern: r"\bdragon\b",
            category: "test",
            severity: RuleSeverity::Critical,
            weight: 0.0,
            explanation: "critical",
        },
        RuleSpec {
            id: "major",
            pattern: r"\bwolf\b",
            category: "test",
            severity: RuleSeverity::Major,
            weight: 2.0,
            explanation: "major",
        },
        RuleSpec {
            id: "minor",
            pattern: r"\bcat\b",
            category: "test",
            severity: RuleSeverity::Minor,
            weight: 0.5,
            explanation: "minor",
        },
        RuleSpec {
            id: "good",
            pattern: r"\bkind\b",
            category: "test",
            severity: RuleSeverity::Supporting,
            weight: 0.25,
            explanation: "supporting",
        },
    ];

    fn set() -> RuleSet {
        RuleSet::compile(TABLE).unwrap()
    }

    #[test]
    fn test_resolve_first_tier_wins() {
        let rules = set();

        assert!(matches!(rules.resolve("a cat and a dragon"), Resolution::Critical(r) if r.id == "crit"));
        assert!(matches!(rules.resolve("a cat and a wolf"), Resolution::Major(_)));
        assert!(matches!(rules.resolve("a kind cat"), Resolution::Minor(_)));
        assert!(matches!(rules.resolve("a kind dog"), Resolution::Clear));
    }

    #[test]
    fn test_resolution_exposes_the_winning_rule() {
        let rules = set();

        assert_eq!(rules.resolve("a wolf chased a cat").rule().map(|r| r.id), Some("major"));
        assert_eq!(rules.resolve("a kind cat").rule().map(|r| r.id), Some("minor"));
        assert!(rules.resolve("a kind dog").rule().is_none());
    }

    #[test]
    fn test_penalty_and_reward_are_separate() {
        let rules = set();
        let text = "the kind wolf met a cat";

        assert!((rules.penalty(text) - 2.5).abs() < 1e-9);
        assert!((rules.reward(text) - 0.25).abs() < 1e-9);
        assert_eq!(rules.supporting_count(text), 1);
    }

    #[test]
    fn test_counts() {
        let rules = set();
        let text = "cat cat wolf";

        assert_eq!(rules.count_matches(text), 2);
        assert_eq!(rules.count_occurrences(text), 3);
        assert_eq!(rules.matches(text).len(), 2);
        assert_eq!(rules.first_match(text).map(|r| r.id), Some("major"));
    }

    #[test]
    fn test_whole_word_boundaries() {
        let rules = set();
        assert!(!rules.any_match("category wolfram dragonfly"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let bad = [RuleSpec {
            id: "bad",
            pattern: r"(unclosed",
            category: "test",
            severity: RuleSeverity::Minor,
            weight: 1.0,
            explanation: "bad",
        }];
        assert!(RuleSet::compile(&bad).is_err());
    }
}
