//! Stereotype similarity checker.
//!
//! Embeds a text and compares it against a fixed catalog of stereotype
//! anchor phrases. Anchor embeddings are computed once when the checker is
//! built. If the embedding backend fails, the checker degrades to a neutral
//! zero-signal record instead of returning an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::text::tokenize;
use crate::types::{BiasCategory, PhraseMatch, SeverityTier, SimilarityRecord};

/// Errors from an embedding backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers.
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Dimensionality of the embeddings.
    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;
}

/// Default embedding width for the local hashing embedder.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Local feature-hashing embedder. Always available, no model download.
///
/// Unigrams and bigrams of content words are hashed into a fixed number of
/// buckets and the vector is L2 normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

const STOPWORDS: &[&str] = &[
    "a", "all", "an", "and", "are", "as", "at", "be", "been", "by", "do", "does", "every", "for",
    "from", "has", "have", "in", "is", "it", "its", "of", "on", "or", "should", "that", "the",
    "their", "them", "they", "this", "to", "was", "were", "with",
];

const BIGRAM_WEIGHT: f32 = 0.5;

/// djb2 string hash.
fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

/// Crude singularization so "terrorists" and "terrorist" share a bucket.
fn stem(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimensions];

        let tokens = tokenize(text);
        let terms: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|w| !STOPWORDS.contains(w))
            .map(stem)
            .collect();

        for term in &terms {
            vector[simple_hash(term) % self.dimensions] += 1.0;
        }
        for pair in terms.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[simple_hash(&bigram) % self.dimensions] += BIGRAM_WEIGHT;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

/// Stand-in used when similarity checking is switched off.
#[derive(Debug, Clone, Default)]
pub struct DisabledEmbedder;

impl Embedder for DisabledEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("similarity checking disabled".to_string()))
    }

    fn dimensions(&self) -> usize {
        0
    }

    fn provider_name(&self) -> &str {
        "disabled"
    }
}

/// Cosine similarity. Zero when either vector has no magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Stereotype anchors, tagged with the bias category each exemplifies.
pub const STEREOTYPE_ANCHORS: &[(&str, BiasCategory)] = &[
    ("Sikh terrorism", BiasCategory::Historical),
    ("Khalistani movement", BiasCategory::Historical),
    ("1984 separatist incident", BiasCategory::Historical),
    ("Golden Temple militant", BiasCategory::Historical),
    ("Sikh political violence", BiasCategory::Historical),
    ("turbaned terrorist", BiasCategory::Representational),
    ("Sikh violent costume", BiasCategory::Representational),
    ("all Sikhs carry weapons", BiasCategory::Representational),
    ("every Sikh is militant", BiasCategory::Representational),
    ("Sikh aggressive behavior", BiasCategory::Representational),
    ("Sikhs are backward", BiasCategory::Representational),
    ("Sikhism is like Islam", BiasCategory::Measurement),
    ("compare Sikh practices to Muslim", BiasCategory::Measurement),
    ("Sikh beliefs similar to Hindu", BiasCategory::Measurement),
    ("Sikh versus other religions", BiasCategory::Measurement),
    ("Sikh community is uniform", BiasCategory::Aggregation),
    ("all Sikhs follow same traditions", BiasCategory::Aggregation),
    ("Sikh identity is simple", BiasCategory::Aggregation),
    ("Sikhs have same practices", BiasCategory::Aggregation),
    ("Western view of Sikhism", BiasCategory::Evaluation),
    ("modern society perspective", BiasCategory::Evaluation),
    ("civilized world standards", BiasCategory::Evaluation),
    ("developed country values", BiasCategory::Evaluation),
    ("primitive Sikh beliefs", BiasCategory::Evaluation),
    ("uncivilized Sikh practices", BiasCategory::Evaluation),
    ("Sikh militant", BiasCategory::General),
    ("Sikh extremist", BiasCategory::General),
    ("Sikh fundamentalist", BiasCategory::General),
    ("Sikh dangerous", BiasCategory::General),
    ("Sikh threatening", BiasCategory::General),
];

/// Cosine bands for severity tiers. Must be monotone: low <= medium <= high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    #[serde(default = "default_low_band")]
    pub low: f64,

    #[serde(default = "default_medium_band")]
    pub medium: f64,

    #[serde(default = "default_high_band")]
    pub high: f64,
}

fn default_low_band() -> f64 {
    0.5
}

fn default_medium_band() -> f64 {
    0.65
}

fn default_high_band() -> f64 {
    0.8
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            low: default_low_band(),
            medium: default_medium_band(),
            high: default_high_band(),
        }
    }
}

impl SeverityBands {
    pub fn is_monotone(&self) -> bool {
        self.low <= self.medium && self.medium <= self.high
    }

    /// Step function from similarity to tier.
    pub fn classify(&self, similarity: f64) -> SeverityTier {
        if similarity >= self.high {
            SeverityTier::High
        } else if similarity >= self.medium {
            SeverityTier::Medium
        } else if similarity >= self.low {
            SeverityTier::Low
        } else {
            SeverityTier::None
        }
    }
}

/// Similarity checker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Whether to run the checker at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Phrases strictly above this similarity are reported as matches
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub bands: SeverityBands,

    /// Width of the local hashing embedder
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.35
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            bands: SeverityBands::default(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

struct Anchor {
    phrase: &'static str,
    category: BiasCategory,
    vector: Vec<f32>,
}

/// Compares texts against the stereotype anchor catalog.
pub struct SimilarityChecker {
    embedder: Arc<dyn Embedder>,
    config: SimilarityConfig,
    /// None when the backend failed while embedding the catalog
    anchors: Option<Vec<Anchor>>,
}

impl SimilarityChecker {
    /// Build a checker, embedding the anchor catalog once.
    pub fn new(embedder: Arc<dyn Embedder>, config: SimilarityConfig) -> Self {
        let phrases: Vec<&str> = STEREOTYPE_ANCHORS.iter().map(|(p, _)| *p).collect();

        let anchors = match embedder.embed_batch(&phrases) {
            Ok(vectors) => Some(
                STEREOTYPE_ANCHORS
                    .iter()
                    .zip(vectors)
                    .map(|(&(phrase, category), vector)| Anchor {
                        phrase,
                        category,
                        vector,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(
                    provider = embedder.provider_name(),
                    error = %e,
                    "Anchor embedding failed, similarity checks will return neutral results"
                );
                None
            }
        };

        Self {
            embedder,
            config,
            anchors,
        }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Whether anchor embeddings are loaded.
    pub fn is_available(&self) -> bool {
        self.anchors.is_some()
    }

    /// Compare `text` against every anchor.
    pub fn compute_similarity(&self, text: &str) -> SimilarityRecord {
        let scores = match self.score_anchors(text) {
            Some(scores) => scores,
            None => return SimilarityRecord::neutral(),
        };

        let max_similarity = scores.iter().map(|m| m.score).fold(0.0, f64::max);
        let threshold = self.config.threshold;

        let mut matched_phrases: Vec<PhraseMatch> =
            scores.into_iter().filter(|m| m.score > threshold).collect();
        matched_phrases.sort_by(|a, b| b.score.total_cmp(&a.score));

        SimilarityRecord {
            max_similarity,
            matched_phrases,
            severity_tier: self.config.bands.classify(max_similarity),
            threshold_exceeded: max_similarity > threshold,
            degraded: false,
        }
    }

    /// The `n` most similar anchors regardless of threshold.
    pub fn top_matches(&self, text: &str, n: usize) -> Vec<PhraseMatch> {
        let mut scores = self.score_anchors(text).unwrap_or_default();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(n);
        scores
    }

    fn score_anchors(&self, text: &str) -> Option<Vec<PhraseMatch>> {
        let anchors = self.anchors.as_ref()?;

        let vector = match self.embedder.embed(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(provider = self.embedder.provider_name(), error = %e, "Embedding failed, degrading to neutral similarity");
                return None;
            }
        };

        if let Some(anchor) = anchors.first() {
            if anchor.vector.len() != vector.len() {
                let e = EmbeddingError::DimensionMismatch {
                    expected: anchor.vector.len(),
                    actual: vector.len(),
                };
                warn!(error = %e, "Embedding width changed, degrading to neutral similarity");
                return None;
            }
        }

        Some(
            anchors
                .iter()
                .map(|anchor| PhraseMatch {
                    phrase: anchor.phrase.to_string(),
                    category: anchor.category,
                    score: cosine_similarity(&vector, &anchor.vector),
                })
                .collect(),
        )
    }
}
