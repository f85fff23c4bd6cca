//! Stabilization passes applied after initial extraction.
//!
//! Every pass only merges; the cluster count never grows. Loops are bounded
//! by the cluster count at entry. [`converge`] repeats the passes until a
//! whole round leaves the partition unchanged.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use tracing::{debug, instrument, trace};

use crate::core::engine::Thresholds;
use crate::core::features::FeatureVector;
use crate::core::label::ClusterLabel;
use crate::core::oracle::{DocSummary, VerifierOracle, settle};
use crate::core::similarity::{PairScores, jaccard, overlap};
use crate::core::tokenize::Tokenizer;
use crate::core::union_find::UnionFind;

/// Union of a cluster's member token sets
#[derive(Debug, Default)]
struct Aggregate
{
    keywords: BTreeSet<String>,
    topics: BTreeSet<String>,
    taxonomy: BTreeSet<String>,
}

fn aggregate(
    members: &[usize],
    vectors: &[FeatureVector],
) -> Aggregate
{
    let mut agg = Aggregate::default();
    for &m in members
    {
        let v = &vectors[m];
        agg.keywords
            .extend(
                v.keywords
                    .iter()
                    .cloned(),
            );
        agg.topics
            .extend(
                v.topic_tokens
                    .iter()
                    .cloned(),
            );
        agg.taxonomy
            .extend(
                v.taxonomy
                    .iter()
                    .cloned(),
            );
    }
    agg
}

/// Move cluster `b` into cluster `a` (a < b), keeping members sorted
fn merge_into(
    clusters: &mut Vec<Vec<usize>>,
    a: usize,
    b: usize,
)
{
    debug_assert!(a < b);
    let moved = clusters.remove(b);
    clusters[a].extend(moved);
    clusters[a].sort_unstable();
}

fn cross_candidate(
    clusters: &[Vec<usize>],
    scores: &mut PairScores<'_>,
    t: &Thresholds,
) -> Option<(usize, usize)>
{
    let vectors = scores.vectors();
    let aggs: Vec<Aggregate> = clusters
        .iter()
        .map(|c| aggregate(c, vectors))
        .collect();
    let taxonomy_floor = (t.cross_group * t.taxonomy_support_ratio).max(t.split);

    for a in 0..clusters.len()
    {
        for b in (a + 1)..clusters.len()
        {
            if clusters[a].len() > t.small_cluster && clusters[b].len() > t.small_cluster
            {
                continue;
            }

            let best = scores.best_between(&clusters[a], &clusters[b]);
            if best < t.split
            {
                continue;
            }

            let kw = jaccard(&aggs[a].keywords, &aggs[b].keywords);
            let topic = jaccard(&aggs[a].topics, &aggs[b].topics);
            let tax = overlap(&aggs[a].taxonomy, &aggs[b].taxonomy);

            let lexical = best >= t.cross_group && (kw >= t.cross_keyword || topic >= t.cross_topic);
            let taxonomic = tax >= t.cross_taxonomy && best >= taxonomy_floor;

            if lexical || taxonomic
            {
                trace!(
                    "Cross merge - a={}, b={}, best={:.3}, kw={:.2}, topic={:.2}, tax={:.2}",
                    a,
                    b,
                    best,
                    kw,
                    topic,
                    tax
                );
                return Some((a, b));
            }
        }
    }
    None
}

/// Merge small clusters into neighbors that agree on score and vocabulary
///
/// Returns the number of merges performed.
#[instrument(skip_all)]
pub fn cross_merge_small(
    clusters: &mut Vec<Vec<usize>>,
    scores: &mut PairScores<'_>,
    t: &Thresholds,
) -> usize
{
    let bound = clusters.len();
    let mut merges = 0;

    for _ in 0..bound
    {
        let Some((a, b)) = cross_candidate(clusters, scores, t)
        else
        {
            break;
        };
        merge_into(clusters, a, b);
        merges += 1;
    }

    debug!("Small-cluster cross merge - merges={}, clusters={}", merges, clusters.len());
    merges
}

/// Fold singletons sharing an origin key into the first such singleton
#[instrument(skip_all)]
pub fn merge_duplicate_origins(
    clusters: &mut Vec<Vec<usize>>,
    vectors: &[FeatureVector],
) -> usize
{
    let mut first_by_origin: BTreeMap<&str, usize> = BTreeMap::new();
    let mut moves: Vec<(usize, usize)> = Vec::new();

    for (idx, members) in clusters
        .iter()
        .enumerate()
    {
        if members.len() != 1
        {
            continue;
        }
        let Some(origin) = vectors[members[0]]
            .origin
            .as_deref()
        else
        {
            continue;
        };
        match first_by_origin.get(origin)
        {
            Some(&target) => moves.push((target, idx)),
            None =>
            {
                first_by_origin.insert(origin, idx);
            }
        }
    }

    if moves.is_empty()
    {
        return 0;
    }

    let mut gone = vec![false; clusters.len()];
    for &(target, source) in &moves
    {
        let member = clusters[source][0];
        trace!("Origin merge - doc={}, into={}", member, target);
        clusters[target].push(member);
        gone[source] = true;
    }
    for &(target, _) in &moves
    {
        clusters[target].sort_unstable();
    }

    let mut idx = 0;
    clusters.retain(|_| {
        let keep = !gone[idx];
        idx += 1;
        keep
    });

    debug!("Duplicate-origin merge - merges={}, clusters={}", moves.len(), clusters.len());
    moves.len()
}

/// One round of label-similarity re-merge
///
/// `labels[k]` names `clusters[k]`. Placeholder names never take part.
/// Name agreement is re-checked against the best member
/// [`vector_affinity`](crate::core::similarity::vector_affinity),
/// not the combined pair score. Returns the number of unions; the caller
/// relabels and repeats while this is non-zero.
#[instrument(skip_all)]
pub fn label_remerge(
    clusters: &mut Vec<Vec<usize>>,
    labels: &[ClusterLabel],
    tokenizer: &Tokenizer,
    scores: &mut PairScores<'_>,
    t: &Thresholds,
) -> usize
{
    debug_assert_eq!(clusters.len(), labels.len());

    let names: Vec<Option<BTreeSet<String>>> = labels
        .iter()
        .map(|l| {
            if l.is_placeholder()
            {
                None
            }
            else
            {
                Some(tokenizer.token_set(&l.name))
                    .filter(|s| !s.is_empty())
            }
        })
        .collect();

    let n = clusters
        .len()
        .min(names.len());
    let mut uf = UnionFind::new(clusters.len());
    let mut merges = 0;

    for a in 0..n
    {
        let Some(name_a) = &names[a]
        else
        {
            continue;
        };
        for b in (a + 1)..n
        {
            let Some(name_b) = &names[b]
            else
            {
                continue;
            };
            if uf.same(a, b) || jaccard(name_a, name_b) < t.label_name
            {
                continue;
            }
            // Isolated singletons stay alone whatever they are called
            let singleton = clusters[a].len() == 1 || clusters[b].len() == 1;
            if singleton && scores.best_between(&clusters[a], &clusters[b]) < t.split
            {
                continue;
            }
            let affinity = scores.best_affinity(&clusters[a], &clusters[b]);
            if affinity >= t.label_vector
            {
                trace!(
                    "Label merge - a={:?}, b={:?}, affinity={:.3}",
                    labels[a].name,
                    labels[b].name,
                    affinity
                );
                uf.union(a, b);
                merges += 1;
            }
        }
    }

    if merges > 0
    {
        let regrouped: Vec<Vec<usize>> = uf
            .groups()
            .into_iter()
            .map(|group| {
                let mut members: Vec<usize> = group
                    .into_iter()
                    .flat_map(|k| {
                        clusters[k]
                            .iter()
                            .copied()
                    })
                    .collect();
                members.sort_unstable();
                members
            })
            .collect();
        *clusters = regrouped;
    }

    debug!("Label re-merge - merges={}, clusters={}", merges, clusters.len());
    merges
}

/// Ask the verifier about singletons that narrowly missed a cluster
#[instrument(skip_all)]
pub fn attach_verified_singletons(
    clusters: &mut Vec<Vec<usize>>,
    scores: &mut PairScores<'_>,
    t: &Thresholds,
    verifier: &dyn VerifierOracle,
    strict: bool,
) -> Result<usize>
{
    let vectors = scores.vectors();
    let mut attached = 0;
    let mut idx = 0;

    while idx < clusters.len()
    {
        if clusters[idx].len() != 1
        {
            idx += 1;
            continue;
        }
        let member = clusters[idx][0];

        // Best cluster and the member that achieved the score
        let mut best: Option<(usize, usize, f32)> = None;
        for (k, other) in clusters
            .iter()
            .enumerate()
        {
            if k == idx
            {
                continue;
            }
            for &o in other
            {
                let s = scores.score(member, o);
                if best.is_none_or(|(_, _, b)| s > b)
                {
                    best = Some((k, o, s));
                }
            }
        }

        let Some((k, rep, s)) = best
        else
        {
            break;
        };
        if s < t.verifier_floor || s >= t.join
        {
            idx += 1;
            continue;
        }

        let verdict = settle(
            verifier.verify(&DocSummary::of(&vectors[member]), &DocSummary::of(&vectors[rep])),
            strict,
            "verifier",
        )
        .with_context(|| format!("verifying document {} against document {}", member, rep))?;

        match verdict
        {
            Some(v) if v.same_topic && v.confidence >= t.verifier_confidence =>
            {
                trace!("Verifier attach - doc={}, into={}, score={:.3}, reason={}", member, k, s, v.reason);
                clusters[k].push(member);
                clusters[k].sort_unstable();
                clusters.remove(idx);
                attached += 1;
            }
            _ => idx += 1,
        }
    }

    debug!("Verifier attach - attached={}, clusters={}", attached, clusters.len());
    Ok(attached)
}

/// Merges made by each pass over a whole [`converge`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts
{
    pub cross: usize,
    pub origin: usize,
    pub verified: usize,
    pub label: usize,
}

impl PassCounts
{
    pub fn total(&self) -> usize
    {
        self.cross + self.origin + self.verified + self.label
    }
}

/// Repeat cross, origin, verifier and label passes until a round merges nothing
///
/// `name` labels a partition; it is called again only after the partition
/// changed. Returns the labels of the final partition, in cluster order.
#[instrument(skip_all)]
pub fn converge<F>(
    clusters: &mut Vec<Vec<usize>>,
    scores: &mut PairScores<'_>,
    tokenizer: &Tokenizer,
    t: &Thresholds,
    verifier: Option<&dyn VerifierOracle>,
    strict: bool,
    mut name: F,
) -> Result<(Vec<ClusterLabel>, PassCounts)>
where
    F: FnMut(&[Vec<usize>]) -> Result<Vec<ClusterLabel>>,
{
    let vectors = scores.vectors();
    let bound = clusters
        .len()
        .max(1);
    let mut counts = PassCounts::default();
    let mut labels = Vec::new();
    let mut stale = true;

    for round in 0..bound
    {
        let before = counts.total();

        counts.cross += cross_merge_small(clusters, scores, t);
        counts.origin += merge_duplicate_origins(clusters, vectors);
        if let Some(oracle) = verifier
        {
            counts.verified += attach_verified_singletons(clusters, scores, t, oracle, strict)?;
        }

        if stale || counts.total() > before
        {
            labels = name(clusters)?;
        }
        let merged = label_remerge(clusters, &labels, tokenizer, scores, t);
        counts.label += merged;
        stale = merged > 0;

        if counts.total() == before
        {
            debug!("Stabilized - rounds={}, clusters={}", round + 1, clusters.len());
            break;
        }
    }

    if stale
    {
        labels = name(clusters)?;
    }
    Ok((labels, counts))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::similarity::Scorer;

    fn vector(
        pos: usize,
        origin: Option<&str>,
    ) -> FeatureVector
    {
        FeatureVector {
            position: pos,
            doc_index: pos,
            origin: origin.map(str::to_string),
            ..FeatureVector::default()
        }
    }

    #[test]
    fn origin_merge_joins_only_singletons()
    {
        let vectors = vec![
            vector(0, Some("youtube.com/@chan")),
            vector(1, None),
            vector(2, Some("youtube.com/@chan")),
            vector(3, Some("youtube.com/@chan")),
            vector(4, Some("youtube.com/@other")),
        ];
        let mut clusters = vec![vec![0], vec![1], vec![2], vec![3, 4]];
        let merged = merge_duplicate_origins(&mut clusters, &vectors);
        assert_eq!(merged, 1);
        assert_eq!(clusters, vec![vec![0, 2], vec![1], vec![3, 4]]);
    }

    #[test]
    fn placeholder_labels_never_remerge()
    {
        let vectors: Vec<FeatureVector> = (0..2)
            .map(|i| vector(i, None))
            .collect();
        let scorer = Scorer::default();
        let mut scores = PairScores::new(&vectors, &scorer);
        scores.prime();
        let labels = vec![
            ClusterLabel { name: "Group 1".into(), description: String::new(), placeholder: true },
            ClusterLabel { name: "Group 2".into(), description: String::new(), placeholder: true },
        ];
        let mut clusters = vec![vec![0], vec![1]];
        let merged = label_remerge(
            &mut clusters,
            &labels,
            &Tokenizer::default(),
            &mut scores,
            // Any vector score passes; only the name guard can refuse
            &Thresholds { label_name: 0.0, label_vector: 0.0, ..Thresholds::default() },
        );
        assert_eq!(merged, 0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn matching_names_merge_on_content_affinity()
    {
        // [0, 1] and [2, 3] agree on content (cosine 0.8) yet score far below join
        let mut vectors: Vec<FeatureVector> = (0..5)
            .map(|i| vector(i, None))
            .collect();
        for (v, e) in vectors
            .iter_mut()
            .zip([[1.0, 0.0], [1.0, 0.0], [0.8, 0.6], [0.8, 0.6], [0.8, 0.6]])
        {
            v.embedding = Some(e.to_vec());
        }
        let scorer = Scorer::default();
        let mut scores = PairScores::new(&vectors, &scorer);
        let t = Thresholds::default();
        assert!(scores.best_between(&[0, 1], &[2, 3]) < t.join);

        let named = |name: &str| ClusterLabel { name: name.into(), description: String::new(), placeholder: false };
        let labels = vec![named("Async Rust Runtime"), named("Async Rust Runtime"), named("Async Rust Runtime")];
        let mut clusters = vec![vec![0, 1], vec![2, 3], vec![4]];
        let merged = label_remerge(&mut clusters, &labels, &Tokenizer::default(), &mut scores, &t);

        // 4 matches on name and content but never reaches split
        assert_eq!(merged, 1);
        assert_eq!(clusters, vec![vec![0, 1, 2, 3], vec![4]]);
    }
}
