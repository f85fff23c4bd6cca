//! Positive outcomes of the merge passes on hand-built vectors.
//!
//! Every vector here is scored by its embedding alone, so each pair score is
//! the cosine written into the test.

use std::collections::BTreeSet;

use tabgroup::core::engine::{Thresholds, absorb_singletons, initial_clusters};
use tabgroup::core::features::FeatureVector;
use tabgroup::core::similarity::PairScores;
use tabgroup::core::stabilize::cross_merge_small;

mod util;
use util::{embedding_scorer, toward};

fn set(items: &[&str]) -> BTreeSet<String>
{
    items
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn with_embedding(
    base: FeatureVector,
    embedding: Vec<f32>,
) -> FeatureVector
{
    FeatureVector { embedding: Some(embedding), ..base }
}

/// Two borderline pairs (cosine 0.38) on separate axes and a loner at 0.3
///
/// Only the first pair shares a domain and merge hints.
fn borderline_corpus() -> Vec<FeatureVector>
{
    let c = (1.0f32 - 0.38 * 0.38).sqrt();
    let hinted = FeatureVector { domain: "docs.rs".into(), merge_hints: set(&["async"]), ..FeatureVector::default() };
    vec![
        with_embedding(hinted.clone(), vec![1.0, 0.0, 0.0, 0.0, 0.0]),
        with_embedding(hinted, vec![0.38, c, 0.0, 0.0, 0.0]),
        with_embedding(FeatureVector { domain: "a.test".into(), ..FeatureVector::default() }, vec![0.0, 0.0, 1.0, 0.0, 0.0]),
        with_embedding(FeatureVector { domain: "b.test".into(), ..FeatureVector::default() }, vec![0.0, 0.0, 0.38, c, 0.0]),
        with_embedding(FeatureVector::default(), vec![0.3, 0.0, 0.0, 0.0, (1.0f32 - 0.09).sqrt()]),
    ]
}

#[test]
fn corroborated_borderline_pair_joins()
{
    let vectors = borderline_corpus();
    let scorer = embedding_scorer();
    let mut scores = PairScores::new(&vectors, &scorer);
    scores.prime();

    let (clusters, stats) = initial_clusters(&mut scores, &Thresholds::default());

    // Same domain plus shared hints backs (0, 1); nothing backs (2, 3)
    assert_eq!(clusters, vec![vec![0, 1], vec![2], vec![3], vec![4]]);
    assert_eq!(stats.joined_pairs, 0);
    assert_eq!(stats.borderline_pairs, 2);
    assert_eq!(stats.corroborated_pairs, 1);
    assert_eq!(stats.initial_clusters, 4);
}

#[test]
fn singleton_at_split_is_absorbed()
{
    let vectors = borderline_corpus();
    let scorer = embedding_scorer();
    let mut scores = PairScores::new(&vectors, &scorer);
    let t = Thresholds::default();
    let (mut clusters, _) = initial_clusters(&mut scores, &t);

    let absorbed = absorb_singletons(&mut clusters, &mut scores, &t);

    // 2 reaches 3 at 0.38; 4 tops out at 0.3 and stays alone
    assert_eq!(absorbed, 1);
    assert_eq!(clusters, vec![vec![0, 1], vec![2, 3], vec![4]]);
}

/// Clusters [0, 1] and [2, 3] whose best cross score is `cos`
fn two_pairs(
    cos: f32,
    left: FeatureVector,
    right: FeatureVector,
) -> Vec<FeatureVector>
{
    vec![
        with_embedding(left.clone(), toward(1.0)),
        with_embedding(left, toward(1.0)),
        with_embedding(right.clone(), toward(cos)),
        with_embedding(right, toward(cos)),
    ]
}

fn cross_merges(vectors: &[FeatureVector]) -> (usize, Vec<Vec<usize>>)
{
    let scorer = embedding_scorer();
    let mut scores = PairScores::new(vectors, &scorer);
    let mut clusters = vec![vec![0, 1], vec![2, 3]];
    let merges = cross_merge_small(&mut clusters, &mut scores, &Thresholds::default());
    (merges, clusters)
}

#[test]
fn small_clusters_merge_on_shared_keywords()
{
    let left = FeatureVector { keywords: set(&["tokio", "scheduler", "runtime"]), ..FeatureVector::default() };
    let right = FeatureVector { keywords: set(&["tokio", "runtime", "reactor"]), ..FeatureVector::default() };

    let (merges, clusters) = cross_merges(&two_pairs(0.41, left, right));
    assert_eq!(merges, 1);
    assert_eq!(clusters, vec![vec![0, 1, 2, 3]]);
}

#[test]
fn small_clusters_merge_on_taxonomy_alone()
{
    let left = FeatureVector { keywords: set(&["sourdough"]), taxonomy: set(&["food"]), ..FeatureVector::default() };
    let right = FeatureVector { keywords: set(&["espresso"]), taxonomy: set(&["food", "drink"]), ..FeatureVector::default() };

    // 0.37 misses the cross-group score but clears its taxonomy share
    let (merges, clusters) = cross_merges(&two_pairs(0.37, left, right));
    assert_eq!(merges, 1);
    assert_eq!(clusters, vec![vec![0, 1, 2, 3]]);
}

#[test]
fn keywords_without_score_support_do_not_merge()
{
    let left = FeatureVector { keywords: set(&["tokio", "scheduler", "runtime"]), ..FeatureVector::default() };
    let right = FeatureVector { keywords: set(&["tokio", "runtime", "reactor"]), ..FeatureVector::default() };

    let (merges, clusters) = cross_merges(&two_pairs(0.37, left, right));
    assert_eq!(merges, 0);
    assert_eq!(clusters, vec![vec![0, 1], vec![2, 3]]);
}
