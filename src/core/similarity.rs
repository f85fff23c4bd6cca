//! Pairwise similarity: a bounded weighted blend of ~15 sub-signals with
//! penalty multipliers, plus the per-run memo of pair scores.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::features::FeatureVector;

/// Sub-signal weights (sum to 1.0 by default) plus the identity bonus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights
{
    pub keywords: f32,
    pub topics: f32,
    pub title: f32,
    pub tfidf: f32,
    pub embedding: f32,
    pub simhash: f32,
    pub taxonomy: f32,
    pub url_path: f32,
    pub domain_exact: f32,
    pub domain_tokens: f32,
    pub language: f32,
    pub merge_hints: f32,
    pub doc_type: f32,
    pub entities: f32,
    pub primary_topic: f32,
    /// Additive bonus when both sides share a platform identity
    pub identity_bonus: f32,
}

impl Default for SimilarityWeights
{
    fn default() -> Self
    {
        Self {
            keywords: 0.12,
            topics: 0.17,
            title: 0.06,
            tfidf: 0.08,
            embedding: 0.14,
            simhash: 0.05,
            taxonomy: 0.07,
            url_path: 0.04,
            domain_exact: 0.03,
            domain_tokens: 0.02,
            language: 0.02,
            merge_hints: 0.07,
            doc_type: 0.04,
            entities: 0.04,
            primary_topic: 0.05,
            identity_bonus: 0.03,
        }
    }
}

impl SimilarityWeights
{
    /// Sum of the sub-signal weights (identity bonus excluded)
    pub fn total(&self) -> f32
    {
        self.keywords
            + self.topics
            + self.title
            + self.tfidf
            + self.embedding
            + self.simhash
            + self.taxonomy
            + self.url_path
            + self.domain_exact
            + self.domain_tokens
            + self.language
            + self.merge_hints
            + self.doc_type
            + self.entities
            + self.primary_topic
    }
}

/// Multipliers applied after the weighted sum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Penalties
{
    /// Both languages known and different
    pub language_mismatch: f32,
    /// Exactly one side is a generic landing page
    pub generic_one: f32,
    /// Both sides are generic landing pages
    pub generic_both: f32,
    /// Both sides name entities but none overlap
    pub entity_mismatch: f32,
    /// No primary-topic overlap and weak topic-token overlap
    pub topic_mismatch: f32,
    /// Topic-token Jaccard below this counts as weak
    pub topic_overlap_floor: f32,
}

impl Default for Penalties
{
    fn default() -> Self
    {
        Self {
            language_mismatch: 0.6,
            generic_one: 0.85,
            generic_both: 0.7,
            entity_mismatch: 0.8,
            topic_mismatch: 0.75,
            topic_overlap_floor: 0.2,
        }
    }
}

/// Every sub-signal for one pair, before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown
{
    pub keywords: f32,
    pub topics: f32,
    pub title: f32,
    pub tfidf: f32,
    pub embedding: f32,
    pub simhash: f32,
    pub taxonomy: f32,
    pub url_path: f32,
    pub domain_exact: f32,
    pub domain_tokens: f32,
    pub language: f32,
    pub merge_hints: f32,
    pub doc_type: f32,
    pub entities: f32,
    pub primary_topic: f32,
    pub same_origin: bool,
    /// Product of all triggered penalties
    pub penalty: f32,
    /// Final clamped score
    pub total: f32,
}

/// Pure, symmetric scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer
{
    pub weights: SimilarityWeights,
    pub penalties: Penalties,
}

impl Scorer
{
    pub fn new(
        weights: SimilarityWeights,
        penalties: Penalties,
    ) -> Self
    {
        Self { weights, penalties }
    }

    /// Score in [0, 1]
    pub fn score(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
    ) -> f32
    {
        self.breakdown(a, b)
            .total
    }

    /// Full sub-signal breakdown (used for diagnostics and borderline pairs)
    pub fn breakdown(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
    ) -> ScoreBreakdown
    {
        let w = &self.weights;
        let mut s = ScoreBreakdown {
            keywords: jaccard(&a.keywords, &b.keywords),
            topics: jaccard(&a.topic_tokens, &b.topic_tokens),
            title: jaccard(&a.title_tokens, &b.title_tokens),
            tfidf: cosine_sparse(&a.tfidf, &b.tfidf),
            embedding: match (&a.embedding, &b.embedding)
            {
                (Some(x), Some(y)) => cosine_dense(x, y),
                _ => 0.0,
            },
            simhash: match (&a.simhash, &b.simhash)
            {
                (Some(x), Some(y)) => x.similarity(y),
                _ => 0.0,
            },
            taxonomy: overlap(&a.taxonomy, &b.taxonomy),
            url_path: jaccard(&a.path_tokens, &b.path_tokens),
            domain_exact: exact(&a.domain, &b.domain),
            domain_tokens: jaccard(&a.domain_tokens, &b.domain_tokens),
            language: exact(&a.language, &b.language),
            merge_hints: jaccard(&a.merge_hints, &b.merge_hints),
            doc_type: exact(&a.doc_type, &b.doc_type),
            entities: overlap(&a.entities, &b.entities),
            primary_topic: overlap(&a.primary_topic_tokens, &b.primary_topic_tokens),
            same_origin: matches!((&a.origin, &b.origin), (Some(x), Some(y)) if x == y),
            penalty: 1.0,
            total: 0.0,
        };

        let mut raw = w.keywords * s.keywords
            + w.topics * s.topics
            + w.title * s.title
            + w.tfidf * s.tfidf
            + w.embedding * s.embedding
            + w.simhash * s.simhash
            + w.taxonomy * s.taxonomy
            + w.url_path * s.url_path
            + w.domain_exact * s.domain_exact
            + w.domain_tokens * s.domain_tokens
            + w.language * s.language
            + w.merge_hints * s.merge_hints
            + w.doc_type * s.doc_type
            + w.entities * s.entities
            + w.primary_topic * s.primary_topic;

        if s.same_origin
        {
            raw += w.identity_bonus;
        }

        s.penalty = self.penalty(a, b, &s);
        s.total = finalize(raw * s.penalty);
        s
    }

    fn penalty(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
        s: &ScoreBreakdown,
    ) -> f32
    {
        let p = &self.penalties;
        let mut m = 1.0;

        // Known, differing languages
        if !a
            .language
            .is_empty()
            && !b
                .language
                .is_empty()
            && a.language != b.language
        {
            m *= p.language_mismatch;
        }

        // Landing pages carry unreliable topical signal
        match (a.generic_landing, b.generic_landing)
        {
            (true, true) => m *= p.generic_both,
            (true, false) | (false, true) => m *= p.generic_one,
            (false, false) =>
            {}
        }

        // Named entities on both sides that never meet
        let both_articles = a.doc_type == "article" && b.doc_type == "article";
        if !a
            .entities
            .is_empty()
            && !b
                .entities
                .is_empty()
            && s.entities == 0.0
            && !both_articles
        {
            m *= p.entity_mismatch;
        }

        // Both sides claim a topic, and the topics disagree
        if !a
            .primary_topic_tokens
            .is_empty()
            && !b
                .primary_topic_tokens
                .is_empty()
            && s.primary_topic == 0.0
            && s.topics < p.topic_overlap_floor
        {
            m *= p.topic_mismatch;
        }

        m
    }
}

/// Clamp into [0, 1]; out-of-range values are programming errors
fn finalize(score: f32) -> f32
{
    if score.is_nan()
    {
        debug_assert!(false, "similarity produced NaN");
        warn!("Similarity produced NaN; clamped to 0");
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// |A ∩ B| / |A ∪ B|, 0 when either side is empty
pub fn jaccard(
    a: &BTreeSet<String>,
    b: &BTreeSet<String>,
) -> f32
{
    if a.is_empty() || b.is_empty()
    {
        return 0.0;
    }
    let inter = a
        .intersection(b)
        .count() as f32;
    let union = (a.len() + b.len()) as f32 - inter;
    inter / union
}

/// |A ∩ B| / min(|A|, |B|), 0 when either side is empty
pub fn overlap(
    a: &BTreeSet<String>,
    b: &BTreeSet<String>,
) -> f32
{
    if a.is_empty() || b.is_empty()
    {
        return 0.0;
    }
    let inter = a
        .intersection(b)
        .count() as f32;
    inter
        / a.len()
            .min(b.len()) as f32
}

/// Binary equality of two non-empty strings
fn exact(
    a: &str,
    b: &str,
) -> f32
{
    if !a.is_empty() && a == b { 1.0 } else { 0.0 }
}

/// Cosine over key-sorted sparse maps, clamped to [0, 1]
pub fn cosine_sparse(
    a: &BTreeMap<String, f32>,
    b: &BTreeMap<String, f32>,
) -> f32
{
    if a.is_empty() || b.is_empty()
    {
        return 0.0;
    }

    // Walk common keys in sorted order so (a, b) and (b, a) sum identically
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f32 = small
        .iter()
        .filter_map(|(k, x)| {
            large
                .get(k)
                .map(|y| x * y)
        })
        .sum();

    let na = a
        .values()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    let nb = b
        .values()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON
    {
        return 0.0;
    }
    (dot / (na * nb)).clamp(0.0, 1.0)
}

/// Cosine over dense vectors of equal length, clamped to [0, 1]
pub fn cosine_dense(
    a: &[f32],
    b: &[f32],
) -> f32
{
    if a.len() != b.len() || a.is_empty()
    {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| x * y)
        .sum();
    let na = a
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    let nb = b
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON
    {
        return 0.0;
    }
    (dot / (na * nb)).clamp(0.0, 1.0)
}

/// Content affinity of two vectors: the stronger of embedding cosine and
/// TF-IDF cosine, ignoring every structural signal
pub fn vector_affinity(
    a: &FeatureVector,
    b: &FeatureVector,
) -> f32
{
    let embedding = match (&a.embedding, &b.embedding)
    {
        (Some(x), Some(y)) => cosine_dense(x, y),
        _ => 0.0,
    };
    embedding.max(cosine_sparse(&a.tfidf, &b.tfidf))
}

/// Unordered pair key
fn key(
    i: usize,
    j: usize,
) -> (usize, usize)
{
    if i <= j { (i, j) } else { (j, i) }
}

/// Memo of pair scores for one clustering run. Entries are never invalidated.
#[derive(Debug, Clone, Default)]
pub struct SimilarityCache
{
    scores: HashMap<(usize, usize), f32>,
    hits: u64,
    misses: u64,
}

impl SimilarityCache
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn get(
        &self,
        i: usize,
        j: usize,
    ) -> Option<f32>
    {
        self.scores
            .get(&key(i, j))
            .copied()
    }

    /// Write-once insert; an existing entry is kept
    pub fn insert(
        &mut self,
        i: usize,
        j: usize,
        score: f32,
    )
    {
        self.scores
            .entry(key(i, j))
            .or_insert(score);
    }

    pub fn len(&self) -> usize
    {
        self.scores
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.scores
            .is_empty()
    }

    /// (hits, misses) of lookups routed through [`PairScores`]
    pub fn stats(&self) -> (u64, u64)
    {
        (self.hits, self.misses)
    }
}

/// Cache-backed scoring view over one run's vectors
pub struct PairScores<'a>
{
    vectors: &'a [FeatureVector],
    scorer: &'a Scorer,
    cache: SimilarityCache,
}

impl<'a> PairScores<'a>
{
    pub fn new(
        vectors: &'a [FeatureVector],
        scorer: &'a Scorer,
    ) -> Self
    {
        Self::with_cache(vectors, scorer, SimilarityCache::new())
    }

    pub fn with_cache(
        vectors: &'a [FeatureVector],
        scorer: &'a Scorer,
        cache: SimilarityCache,
    ) -> Self
    {
        Self { vectors, scorer, cache }
    }

    pub fn vectors(&self) -> &'a [FeatureVector]
    {
        self.vectors
    }

    pub fn scorer(&self) -> &'a Scorer
    {
        self.scorer
    }

    pub fn cache(&self) -> &SimilarityCache
    {
        &self.cache
    }

    pub fn into_cache(self) -> SimilarityCache
    {
        self.cache
    }

    /// Score every unordered pair in parallel; inserts in ascending (i, j) order
    #[instrument(skip_all, fields(docs = self.vectors.len()))]
    pub fn prime(&mut self)
    {
        let n = self
            .vectors
            .len();
        let vectors = self.vectors;
        let scorer = self.scorer;

        let rows: Vec<Vec<(usize, usize, f32)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| (i, j, scorer.score(&vectors[i], &vectors[j])))
                    .collect()
            })
            .collect();

        for (i, j, s) in rows
            .into_iter()
            .flatten()
        {
            self.cache
                .insert(i, j, s);
        }

        debug!("Primed similarity cache - pairs={}", self.cache.len());
    }

    /// Cached score for (i, j); self-similarity is 1 by definition
    pub fn score(
        &mut self,
        i: usize,
        j: usize,
    ) -> f32
    {
        if i == j
        {
            return 1.0;
        }
        if let Some(s) = self
            .cache
            .get(i, j)
        {
            self.cache.hits += 1;
            return s;
        }
        self.cache.misses += 1;
        let s = self
            .scorer
            .score(&self.vectors[i], &self.vectors[j]);
        self.cache
            .insert(i, j, s);
        s
    }

    /// Best member-to-member score between two groups
    pub fn best_between(
        &mut self,
        a: &[usize],
        b: &[usize],
    ) -> f32
    {
        let mut best = 0.0f32;
        for &i in a
        {
            for &j in b
            {
                let s = self.score(i, j);
                if s > best
                {
                    best = s;
                }
            }
        }
        best
    }

    /// Best member-to-member [`vector_affinity`] between two groups (uncached)
    pub fn best_affinity(
        &self,
        a: &[usize],
        b: &[usize],
    ) -> f32
    {
        a.iter()
            .flat_map(|&i| {
                b.iter()
                    .map(move |&j| (i, j))
            })
            .map(|(i, j)| vector_affinity(&self.vectors[i], &self.vectors[j]))
            .fold(0.0, f32::max)
    }
}
