//! Union-find clustering with a two-threshold (hysteresis) pass.
//!
//! 1. Pairs at or above `join` are united immediately.
//! 2. Pairs in `[split, join)` are kept as borderline candidates together
//!    with their auxiliary signals.
//! 3. Borderline pairs are replayed by descending score (ties: lowest
//!    indices first) and united only when a secondary signal corroborates.
//! 4. Clusters are read off the forest.
//! 5. Singletons are absorbed into their best cluster when the best
//!    cross-cluster score reaches `split`.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::core::features::FeatureVector;
use crate::core::similarity::{PairScores, cosine_dense, jaccard, overlap};
use crate::core::union_find::UnionFind;

/// Every clustering threshold, kept overridable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds
{
    /// Merge immediately at or above this score
    pub join: f32,
    /// Never merge below this score (strictly below `join`)
    pub split: f32,

    // Borderline corroboration
    /// Same domain and merge-hint overlap at least this
    pub corroborate_hint_overlap: f32,
    /// Primary-topic overlap at least this ...
    pub corroborate_topic_overlap: f32,
    /// ... together with taxonomy overlap at least this
    pub corroborate_topic_taxonomy: f32,
    pub corroborate_simhash: f32,
    pub corroborate_embedding: f32,

    // Small-cluster cross merge
    /// Clusters at or below this size take part in the cross merge
    pub small_cluster: usize,
    pub cross_group: f32,
    pub cross_keyword: f32,
    pub cross_topic: f32,
    pub cross_taxonomy: f32,
    /// Fraction of `cross_group` required when only taxonomy agrees
    pub taxonomy_support_ratio: f32,

    // Label re-merge
    pub label_name: f32,
    pub label_vector: f32,

    // Verifier attach
    /// Singletons scoring in `[verifier_floor, join)` may be verified
    pub verifier_floor: f32,
    pub verifier_confidence: f32,
}

impl Default for Thresholds
{
    fn default() -> Self
    {
        Self {
            join: 0.42,
            split: 0.35,
            corroborate_hint_overlap: 0.35,
            corroborate_topic_overlap: 0.55,
            corroborate_topic_taxonomy: 0.35,
            corroborate_simhash: 0.62,
            corroborate_embedding: 0.68,
            small_cluster: 3,
            cross_group: 0.40,
            cross_keyword: 0.25,
            cross_topic: 0.30,
            cross_taxonomy: 0.35,
            taxonomy_support_ratio: 0.9,
            label_name: 0.62,
            label_vector: 0.50,
            verifier_floor: 0.22,
            verifier_confidence: 0.6,
        }
    }
}

/// Auxiliary signals recorded for a borderline pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairSignals
{
    pub domain_match: bool,
    pub merge_hint_overlap: f32,
    pub primary_topic_overlap: f32,
    pub taxonomy_overlap: f32,
    pub simhash: f32,
    pub embedding_cosine: f32,
}

impl PairSignals
{
    /// Read the signals straight off two vectors, without re-scoring the pair
    pub fn between(
        a: &FeatureVector,
        b: &FeatureVector,
    ) -> Self
    {
        Self {
            domain_match: !a
                .domain
                .is_empty()
                && a.domain == b.domain,
            merge_hint_overlap: jaccard(&a.merge_hints, &b.merge_hints),
            primary_topic_overlap: overlap(&a.primary_topic_tokens, &b.primary_topic_tokens),
            taxonomy_overlap: overlap(&a.taxonomy, &b.taxonomy),
            simhash: match (&a.simhash, &b.simhash)
            {
                (Some(x), Some(y)) => x.similarity(y),
                _ => 0.0,
            },
            embedding_cosine: match (&a.embedding, &b.embedding)
            {
                (Some(x), Some(y)) => cosine_dense(x, y),
                _ => 0.0,
            },
        }
    }
}

/// A pair scored in `[split, join)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BorderlinePair
{
    pub i: usize,
    pub j: usize,
    pub score: f32,
    pub signals: PairSignals,
}

/// Counters for one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats
{
    pub pairs_scored: usize,
    pub joined_pairs: usize,
    pub borderline_pairs: usize,
    pub corroborated_pairs: usize,
    pub initial_clusters: usize,
    pub absorbed_singletons: usize,
}

/// Whether a secondary rule backs a borderline merge
pub fn corroborates(
    s: &PairSignals,
    t: &Thresholds,
) -> bool
{
    (s.domain_match && s.merge_hint_overlap >= t.corroborate_hint_overlap)
        || (s.primary_topic_overlap >= t.corroborate_topic_overlap
            && s.taxonomy_overlap >= t.corroborate_topic_taxonomy)
        || s.simhash >= t.corroborate_simhash
        || s.embedding_cosine >= t.corroborate_embedding
}

/// Steps 1-4: pairwise pass, hysteresis replay, extraction
#[instrument(skip_all)]
pub fn initial_clusters(
    scores: &mut PairScores<'_>,
    t: &Thresholds,
) -> (Vec<Vec<usize>>, EngineStats)
{
    let vectors = scores.vectors();
    let n = vectors.len();
    let mut uf = UnionFind::new(n);
    let mut stats = EngineStats::default();
    let mut borderline: Vec<BorderlinePair> = Vec::new();

    // 1) + 2) Pairwise decisions
    for i in 0..n
    {
        for j in (i + 1)..n
        {
            let score = scores.score(i, j);
            stats.pairs_scored += 1;

            if score >= t.join
            {
                uf.union(i, j);
                stats.joined_pairs += 1;
            }
            else if score >= t.split
            {
                borderline.push(BorderlinePair {
                    i,
                    j,
                    score,
                    signals: PairSignals::between(&vectors[i], &vectors[j]),
                });
            }
        }
    }
    stats.borderline_pairs = borderline.len();

    // 3) Hysteresis replay: score desc, then lowest indices first
    borderline.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.i.cmp(&b.i))
            .then(a.j.cmp(&b.j))
    });

    for pair in &borderline
    {
        if uf.same(pair.i, pair.j)
        {
            continue;
        }
        if corroborates(&pair.signals, t)
        {
            trace!("Borderline merge - i={}, j={}, score={:.3}", pair.i, pair.j, pair.score);
            uf.union(pair.i, pair.j);
            stats.corroborated_pairs += 1;
        }
    }

    // 4) Extraction
    let clusters = uf.groups();
    stats.initial_clusters = clusters.len();

    debug!(
        "Initial clustering - docs={}, joined={}, borderline={}, corroborated={}, clusters={}",
        n, stats.joined_pairs, stats.borderline_pairs, stats.corroborated_pairs, stats.initial_clusters
    );

    (clusters, stats)
}

/// Step 5: fold singletons into their best cluster when it reaches `split`
///
/// Returns the number of absorbed singletons.
#[instrument(skip_all)]
pub fn absorb_singletons(
    clusters: &mut Vec<Vec<usize>>,
    scores: &mut PairScores<'_>,
    t: &Thresholds,
) -> usize
{
    let mut absorbed = 0;
    let mut idx = 0;

    while idx < clusters.len()
    {
        if clusters[idx].len() != 1
        {
            idx += 1;
            continue;
        }

        let member = clusters[idx][0];
        let mut best: Option<(usize, f32)> = None;

        for (k, other) in clusters
            .iter()
            .enumerate()
        {
            if k == idx
            {
                continue;
            }
            let s = scores.best_between(&[member], other);
            // Strict comparison keeps the earliest cluster on ties
            if best.is_none_or(|(_, b)| s > b)
            {
                best = Some((k, s));
            }
        }

        match best
        {
            Some((k, s)) if s >= t.split =>
            {
                trace!("Absorbing singleton - doc={}, into={}, score={:.3}", member, k, s);
                clusters[k].push(member);
                clusters[k].sort_unstable();
                clusters.remove(idx);
                absorbed += 1;
            }
            _ => idx += 1,
        }
    }

    debug!("Singleton absorption - absorbed={}, clusters={}", absorbed, clusters.len());
    absorbed
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn signals() -> PairSignals
    {
        PairSignals {
            domain_match: false,
            merge_hint_overlap: 0.0,
            primary_topic_overlap: 0.0,
            taxonomy_overlap: 0.0,
            simhash: 0.0,
            embedding_cosine: 0.0,
        }
    }

    #[test]
    fn corroboration_rules()
    {
        let t = Thresholds::default();
        assert!(!corroborates(&signals(), &t));

        let hint = PairSignals { domain_match: true, merge_hint_overlap: 0.4, ..signals() };
        assert!(corroborates(&hint, &t));

        let hint_other_domain = PairSignals { domain_match: false, ..hint };
        assert!(!corroborates(&hint_other_domain, &t));

        let topic = PairSignals { primary_topic_overlap: 0.6, taxonomy_overlap: 0.5, ..signals() };
        assert!(corroborates(&topic, &t));

        let topic_only = PairSignals { primary_topic_overlap: 0.9, ..signals() };
        assert!(!corroborates(&topic_only, &t));

        assert!(corroborates(&PairSignals { simhash: 0.7, ..signals() }, &t));
        assert!(corroborates(&PairSignals { embedding_cosine: 0.68, ..signals() }, &t));
    }

    #[test]
    fn signals_agree_with_full_breakdown()
    {
        use crate::core::features::Simhash;
        use crate::core::similarity::Scorer;

        let set = |items: &[&str]| -> std::collections::BTreeSet<String> {
            items
                .iter()
                .map(|s| s.to_string())
                .collect()
        };
        let a = FeatureVector {
            domain: "tokio.rs".into(),
            merge_hints: set(&["runtime", "async"]),
            primary_topic_tokens: set(&["tokio"]),
            taxonomy: set(&["rust"]),
            keywords: set(&["tokio", "scheduler", "worker"]),
            simhash: Simhash::of(&set(&["tokio", "scheduler", "worker"]), 32),
            embedding: Some(vec![1.0, 0.0]),
            ..FeatureVector::default()
        };
        let b = FeatureVector {
            domain: "tokio.rs".into(),
            merge_hints: set(&["runtime"]),
            primary_topic_tokens: set(&["tokio", "runtime"]),
            taxonomy: set(&["rust", "systems"]),
            keywords: set(&["tokio", "reactor"]),
            simhash: Simhash::of(&set(&["tokio", "reactor"]), 32),
            embedding: Some(vec![0.6, 0.8]),
            ..FeatureVector::default()
        };

        let s = PairSignals::between(&a, &b);
        let full = Scorer::default().breakdown(&a, &b);
        assert!(s.domain_match);
        assert_eq!(s.merge_hint_overlap, full.merge_hints);
        assert_eq!(s.primary_topic_overlap, full.primary_topic);
        assert_eq!(s.taxonomy_overlap, full.taxonomy);
        assert_eq!(s.simhash, full.simhash);
        assert_eq!(s.embedding_cosine, full.embedding);
        assert!(!PairSignals::between(&FeatureVector::default(), &FeatureVector::default()).domain_match);
    }

    #[test]
    fn borderline_pairs_are_scored_once()
    {
        use crate::core::similarity::Scorer;

        let v: Vec<FeatureVector> = [[1.0, 0.0], [0.8, 0.6], [0.0, 1.0]]
            .into_iter()
            .map(|e| FeatureVector { embedding: Some(e.to_vec()), ..FeatureVector::default() })
            .collect();
        let scorer = Scorer::default();
        let mut scores = PairScores::new(&v, &scorer);
        scores.prime();
        let (_, stats) = initial_clusters(&mut scores, &Thresholds { join: 0.12, split: 0.1, ..Thresholds::default() });
        assert_eq!(stats.pairs_scored, 3);
        assert_eq!(
            scores
                .cache()
                .stats(),
            (3, 0)
        );
    }

    #[test]
    fn default_thresholds_are_ordered()
    {
        let t = Thresholds::default();
        assert!(t.split < t.join);
        assert!(t.verifier_floor < t.split);
        assert!(t.cross_group * t.taxonomy_support_ratio >= t.split);
    }
}
