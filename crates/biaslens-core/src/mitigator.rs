//! Text mitigation strategies.
//!
//! The [`Mitigator`] rewrites a text with one of the five [`Strategy`]
//! values. Every rewrite is a deterministic function of the input text and
//! the strategy. Instructional prompting never changes the text; it returns
//! follow-up prompt templates instead.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::patterns::CONFLATION_RULES;
use crate::rules::RuleSet;
use crate::text::{match_case, tokenize};
use crate::types::{GroundingSource, MitigationRecord, Strategy};

/// Bonus added to the reduction estimate when a grounding fact was injected.
pub const GROUNDING_BONUS: f64 = 0.2;

/// Topic used to fill instructional prompt templates.
const PROMPT_TOPIC: &str = "Sikhs and Sikhism";

struct CuratedFact {
    text: &'static str,
    source: &'static str,
    url: &'static str,
    keywords: &'static [&'static str],
}

const GROUNDING_FACTS: &[CuratedFact] = &[
    CuratedFact {
        text: "Sikhism is a distinct monotheistic religion founded in Punjab in the 15th century by Guru Nanak.",
        source: "Sikh Coalition",
        url: "https://www.sikhcoalition.org/about-sikhs/",
        keywords: &[
            "islam", "islamic", "muslim", "muslims", "hindu", "hindus", "hinduism", "religion",
            "branch", "sect", "founded", "origin", "derived", "mixture", "blend", "monotheistic",
        ],
    },
    CuratedFact {
        text: "Sikhs believe in equality, seva and honest work (kirat karni), as taught in the Guru Granth Sahib.",
        source: "Guru Granth Sahib, Ang 1",
        url: "https://www.srigurugranth.org/",
        keywords: &[
            "equality", "equal", "caste", "women", "gender", "work", "belief", "beliefs", "values",
            "backward", "primitive", "inferior", "uncivilized",
        ],
    },
    CuratedFact {
        text: "The turban (dastaar) is an article of faith representing dignity and commitment, not a weapon.",
        source: "Sikh Research Institute",
        url: "https://www.sikhri.org/articles/the-turban",
        keywords: &[
            "turban", "turbans", "dastaar", "beard", "beards", "hair", "kesh", "weapon", "weapons",
            "kirpan", "dagger", "costume",
        ],
    },
    CuratedFact {
        text: "Sikhism promotes peace, tolerance and community service through seva (selfless service).",
        source: "World Sikh Organization",
        url: "https://www.worldsikh.org/sikh_beliefs",
        keywords: &[
            "terrorist", "terrorists", "terrorism", "violence", "violent", "dangerous", "militant",
            "militants", "extremist", "extremists", "feared", "fear", "threat", "service", "seva",
            "peace", "community", "langar",
        ],
    },
    CuratedFact {
        text: "Sikhism was shaped by ten Gurus, and its scripture, the Guru Granth Sahib, is regarded as the eternal Guru.",
        source: "Shiromani Gurdwara Parbandhak Committee",
        url: "https://sgpc.net/sikhism/",
        keywords: &["guru", "gurus", "scripture", "granth", "nanak", "gobind", "khalsa", "bani"],
    },
];

struct CounterNarrative {
    text: &'static str,
    keywords: &'static [&'static str],
}

const COUNTER_NARRATIVES: &[CounterNarrative] = &[
    CounterNarrative {
        text: "Sikhism promotes universal brotherhood and service to humanity.",
        keywords: &[],
    },
    CounterNarrative {
        text: "The Sikh community has a long history of humanitarian work and disaster relief.",
        keywords: &[
            "terrorist", "terrorists", "terrorism", "violent", "dangerous", "threat", "militant",
            "militants", "feared",
        ],
    },
    CounterNarrative {
        text: "Sikhs believe in the equality of human beings regardless of religion, caste or gender.",
        keywords: &["inferior", "backward", "primitive", "uncivilized", "savage", "women", "caste"],
    },
    CounterNarrative {
        text: "The turban represents dignity, self-respect and commitment to Sikh values.",
        keywords: &["turban", "turbans", "beard", "kirpan", "dagger", "weapon", "costume"],
    },
    CounterNarrative {
        text: "Sikhs have been at the forefront of civil rights movements and social justice.",
        keywords: &["extremist", "extremists", "radical", "fundamentalist", "rights", "justice"],
    },
];

/// Charged term to neutral replacement. Matching is whole-word and
/// case-insensitive.
const NEUTRAL_LEXICON: &[(&str, &str)] = &[
    ("all sikhs", "some Sikhs"),
    ("every sikh", "many Sikhs"),
    ("sikhs always", "Sikhs often"),
    ("sikhs never", "Sikhs rarely"),
    ("terrorists", "individuals"),
    ("terrorist", "individual"),
    ("terrorism", "conflict"),
    ("militants", "devout members"),
    ("militant", "devout"),
    ("extremists", "believers"),
    ("extremist", "faithful"),
    ("radical", "traditional"),
    ("fundamentalist", "practicing"),
    ("violent", "martial"),
    ("aggressive", "assertive"),
    ("dangerous", "distinctive"),
    ("threatening", "noticeable"),
    ("feared", "understood"),
    ("fear", "concern"),
    ("danger", "risk"),
    ("threat", "challenge"),
    ("backward", "traditional"),
    ("primitive", "ancient"),
    ("uncivilized", "different"),
];

const INSTRUCTION_TEMPLATES: &[&str] = &[
    "Please provide a factual, unbiased description of {topic} that avoids stereotypes and generalizations.",
    "When discussing {topic}, focus on accurate information and avoid making assumptions about groups.",
    "Provide a balanced perspective on {topic} that respects cultural diversity and individual differences.",
];

const GENERIC_FOLLOWUPS: &[&str] = &[
    "Please provide a factual, unbiased description that avoids stereotypes.",
    "Focus on accurate information and avoid making assumptions about groups.",
    "Provide a balanced perspective that respects cultural diversity.",
];

/// Order in which [`Mitigator::mitigate_layered`] applies text-level strategies.
pub const LAYER_ORDER: [Strategy; 4] = [
    Strategy::RetrievalGrounding,
    Strategy::NeutralLanguageSubstitution,
    Strategy::ContextualReframing,
    Strategy::CounterNarrative,
];

const GROUP_TERMS: &str = r"sikhs?|muslims?|hindus?|jews?|christians?";

/// What makes a strategy applicable to a lowercased text.
enum Trigger {
    Rules(&'static RuleSet),
    Pattern(Regex),
}

impl Trigger {
    fn is_match(&self, lower: &str) -> bool {
        match self {
            Trigger::Rules(rules) => rules.any_match(lower),
            Trigger::Pattern(pattern) => pattern.is_match(lower),
        }
    }
}

lazy_static! {
    /// Ordered strategy triggers, most harmful pattern category first.
    /// Conflation reuses the scorer's rules, so naming Sikhs alongside
    /// another faith is not enough on its own.
    static ref SELECTION_TABLE: Vec<(Trigger, Strategy)> = vec![
        (Trigger::Rules(&*CONFLATION_RULES), Strategy::RetrievalGrounding),
        (
            Trigger::Pattern(Regex::new(r"\b(terrorists?|terrorism|militants?|extremists?|radical|fundamentalist)\b").unwrap()),
            Strategy::NeutralLanguageSubstitution,
        ),
        (
            Trigger::Pattern(Regex::new(&format!(r"\b(all|every)\s+({g})\b|\b({g})\s+(always|never)\b", g = GROUP_TERMS)).unwrap()),
            Strategy::ContextualReframing,
        ),
        (
            Trigger::Pattern(Regex::new(r"\b(backward|primitive|uncivilized|savage|inferior)\b").unwrap()),
            Strategy::CounterNarrative,
        ),
        (
            Trigger::Pattern(Regex::new(r"\b(fear\w*|danger\w*|threat\w*|violent|aggressive)\b").unwrap()),
            Strategy::NeutralLanguageSubstitution,
        ),
    ];

    static ref LEXICON_LOOKUP: HashMap<&'static str, &'static str> =
        NEUTRAL_LEXICON.iter().copied().collect();

    static ref LEXICON_PATTERN: Regex = {
        let mut keys: Vec<&str> = NEUTRAL_LEXICON.iter().map(|(k, _)| *k).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
        Regex::new(&format!(r"(?i)\b({})\b", alternation)).unwrap()
    };

    static ref QUANTIFIER_PATTERN: Regex =
        Regex::new(&format!(r"(?i)\b(all|every)(\s+)({})\b", GROUP_TERMS)).unwrap();

    static ref FREQUENCY_PATTERN: Regex =
        Regex::new(&format!(r"(?i)\b({})(\s+)(always|never)\b", GROUP_TERMS)).unwrap();

    /// Vocabulary counted for the bias-reduction estimate.
    static ref BIAS_TERMS: Regex = Regex::new(
        r"\b(all|every|always|never|terrorists?|terrorism|militants?|extremists?|radical|fundamentalist|backward|primitive|uncivilized|dangerous|threatening|violent|aggressive|feared|fear)\b"
    )
    .unwrap();
}

/// One entry of the strategy catalog.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub strategy: Strategy,
    pub name: &'static str,
    pub description: &'static str,
    pub applicable_to: &'static [&'static str],
}

/// Result of applying several strategies in sequence.
#[derive(Debug, Clone, Serialize)]
pub struct LayeredMitigation {
    pub original_text: String,
    pub rewritten_text: String,
    pub steps: Vec<MitigationRecord>,
}

impl LayeredMitigation {
    pub fn strategies(&self) -> Vec<Strategy> {
        self.steps.iter().map(|s| s.strategy).collect()
    }
}

/// Rewrites text to reduce bias.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mitigator;

impl Mitigator {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `text` with `strategy`, or with the best-fit strategy when none is given.
    pub fn mitigate(&self, text: &str, strategy: Option<Strategy>) -> MitigationRecord {
        let strategy = strategy.unwrap_or_else(|| self.select_strategy(text));

        let (rewritten_text, grounding) = self.apply(text, strategy);
        let bias_reduction_estimate = bias_reduction(text, &rewritten_text, grounding.is_some());
        let confidence = mitigation_confidence(bias_reduction_estimate);

        let mut explanations = vec![
            format!("Applied {} strategy", strategy.display_name()),
            format!("Strategy: {}", strategy.description()),
        ];
        // A text without bias terms scores full reduction without anything to reduce
        if count_bias_terms(text) > 0 && rewritten_text != text && bias_reduction_estimate > 0.0 {
            explanations.push(format!(
                "Reduced bias terms by {:.0}%",
                bias_reduction_estimate * 100.0
            ));
        }
        match (&grounding, strategy) {
            (Some(source), _) => {
                explanations.push(format!("Grounded with a fact from {}", source.source))
            }
            (None, strategy) if !strategy.rewrites_text() => explanations.push(
                "Text left unchanged; use the suggested prompts for the next generation request"
                    .to_string(),
            ),
            _ => {}
        }

        MitigationRecord {
            original_text: text.to_string(),
            rewritten_text,
            strategy,
            bias_reduction_estimate,
            confidence,
            explanations,
            suggested_followup_prompts: followup_prompts(strategy),
            grounding_sources: grounding.map(|source| vec![source]),
        }
    }

    /// First strategy whose trigger matches, in harm order.
    pub fn select_strategy(&self, text: &str) -> Strategy {
        let lower = text.to_lowercase();
        SELECTION_TABLE
            .iter()
            .find(|(trigger, _)| trigger.is_match(&lower))
            .map(|(_, strategy)| *strategy)
            .unwrap_or(Strategy::InstructionalPrompting)
    }

    /// Every strategy with a matching trigger, deduplicated, in harm order.
    pub fn applicable_strategies(&self, text: &str) -> Vec<Strategy> {
        let lower = text.to_lowercase();
        let mut strategies = Vec::new();
        for (trigger, strategy) in SELECTION_TABLE.iter() {
            if trigger.is_match(&lower) && !strategies.contains(strategy) {
                strategies.push(*strategy);
            }
        }
        strategies
    }

    /// Apply every applicable text-level strategy in [`LAYER_ORDER`].
    pub fn mitigate_layered(&self, text: &str) -> LayeredMitigation {
        let applicable = self.applicable_strategies(text);
        let mut current = text.to_string();
        let mut steps = Vec::new();

        for strategy in LAYER_ORDER {
            if !applicable.contains(&strategy) {
                continue;
            }
            let step = self.mitigate(&current, Some(strategy));
            current = step.rewritten_text.clone();
            steps.push(step);
        }

        LayeredMitigation {
            original_text: text.to_string(),
            rewritten_text: current,
            steps,
        }
    }

    /// The strategy catalog.
    pub fn available_strategies(&self) -> Vec<StrategyInfo> {
        Strategy::ALL
            .iter()
            .map(|s| StrategyInfo {
                strategy: *s,
                name: s.display_name(),
                description: s.description(),
                applicable_to: s.applicable_to(),
            })
            .collect()
    }

    fn apply(&self, text: &str, strategy: Strategy) -> (String, Option<GroundingSource>) {
        match strategy {
            Strategy::RetrievalGrounding => {
                let fact = select_fact(text);
                let rewritten = if text.trim().is_empty() {
                    fact.text.to_string()
                } else {
                    format!("{} {}", fact.text, text)
                };
                let source = GroundingSource {
                    text: fact.text.to_string(),
                    source: fact.source.to_string(),
                    url: fact.url.to_string(),
                };
                (rewritten, Some(source))
            }
            Strategy::NeutralLanguageSubstitution => (substitute_neutral(text), None),
            Strategy::ContextualReframing => (reframe(text), None),
            Strategy::CounterNarrative => (append_counter_narrative(text), None),
            Strategy::InstructionalPrompting => (text.to_string(), None),
        }
    }
}

fn keyword_overlap(tokens: &HashSet<String>, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| tokens.contains(**k)).count()
}

/// Highest keyword overlap wins; ties and no overlap fall back to the earliest entry.
fn best_by_overlap<'a, T>(text: &str, entries: &'a [T], keywords: impl Fn(&T) -> &[&str]) -> &'a T {
    let tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let mut best = &entries[0];
    let mut best_overlap = 0;
    for entry in entries {
        let overlap = keyword_overlap(&tokens, keywords(entry));
        if overlap > best_overlap {
            best = entry;
            best_overlap = overlap;
        }
    }
    best
}

fn select_fact(text: &str) -> &'static CuratedFact {
    best_by_overlap(text, GROUNDING_FACTS, |f| f.keywords)
}

fn select_counter_narrative(text: &str) -> &'static CounterNarrative {
    best_by_overlap(text, COUNTER_NARRATIVES, |n| n.keywords)
}

/// Single-pass whole-word replacement from the neutral lexicon.
pub fn substitute_neutral(text: &str) -> String {
    LEXICON_PATTERN
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            match LEXICON_LOOKUP.get(matched.to_lowercase().as_str()) {
                Some(replacement) => match_case(matched, replacement),
                None => matched.to_string(),
            }
        })
        .into_owned()
}

/// Qualify absolute quantifiers over a group, keeping the group name.
pub fn reframe(text: &str) -> String {
    let qualified = QUANTIFIER_PATTERN.replace_all(text, |caps: &Captures| {
        let quantifier = &caps[1];
        let qualifier = if quantifier.eq_ignore_ascii_case("all") {
            "some"
        } else {
            "not every"
        };
        format!("{}{}{}", match_case(quantifier, qualifier), &caps[2], &caps[3])
    });

    FREQUENCY_PATTERN
        .replace_all(&qualified, |caps: &Captures| {
            let frequency = &caps[3];
            let softened = if frequency.eq_ignore_ascii_case("always") {
                "often"
            } else {
                "rarely"
            };
            format!("{}{}{}", &caps[1], &caps[2], match_case(frequency, softened))
        })
        .into_owned()
}

/// Append a counter-stereotype statement without touching existing content.
pub fn append_counter_narrative(text: &str) -> String {
    let narrative = select_counter_narrative(text).text;
    let base = text.trim_end();
    let separator = if base.is_empty() {
        ""
    } else if base.ends_with(['.', '!', '?']) {
        " "
    } else {
        ". "
    };
    format!("{}{}{}", base, separator, narrative)
}

fn followup_prompts(strategy: Strategy) -> Vec<String> {
    match strategy {
        Strategy::InstructionalPrompting => INSTRUCTION_TEMPLATES
            .iter()
            .map(|t| t.replace("{topic}", PROMPT_TOPIC))
            .collect(),
        _ => GENERIC_FOLLOWUPS.iter().map(|p| p.to_string()).collect(),
    }
}

fn count_bias_terms(text: &str) -> usize {
    BIAS_TERMS.find_iter(&text.to_lowercase()).count()
}

/// Relative reduction of bias-term occurrences, plus the grounding bonus.
pub fn bias_reduction(original: &str, rewritten: &str, grounded: bool) -> f64 {
    let before = count_bias_terms(original);
    if before == 0 {
        return 1.0;
    }
    let after = count_bias_terms(rewritten);
    let mut reduction = (before as f64 - after as f64) / before as f64;
    if grounded {
        reduction += GROUNDING_BONUS;
    }
    reduction.clamp(0.0, 1.0)
}

fn mitigation_confidence(reduction: f64) -> f64 {
    if reduction > 0.5 {
        0.9
    } else if reduction > 0.2 {
        0.7
    } else {
        0.5
    }
}
