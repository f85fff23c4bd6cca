//! Property tests for the pair scorer: symmetry, boundedness and the
//! reflexive ceiling.

use std::collections::{BTreeMap, BTreeSet};

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use tabgroup::core::features::{FeatureVector, Simhash};
use tabgroup::core::similarity::{Scorer, SimilarityWeights};

static VOCAB: [&str; 12] = [
    "rust", "tokio", "async", "bread", "flour", "oven", "marathon", "tempo", "taper", "video", "music", "news",
];

fn token_set(min: usize) -> impl Strategy<Value = BTreeSet<String>>
{
    btree_set(prop::sample::select(&VOCAB[..]).prop_map(str::to_string), min..6)
}

fn label(options: &'static [&'static str]) -> impl Strategy<Value = String>
{
    prop::sample::select(options).prop_map(str::to_string)
}

/// Arbitrary vector; any field may be empty
fn any_vector() -> impl Strategy<Value = FeatureVector>
{
    (
        (token_set(0), token_set(0), token_set(0), token_set(0), token_set(0)),
        (token_set(0), token_set(0), token_set(0)),
        (
            label(&["", "example.com", "tokio.rs"]),
            label(&["", "en", "de"]),
            label(&["", "article", "docs", "landing"]),
            any::<bool>(),
        ),
        prop::option::of(vec(-1.0f32..1.0, 8)),
        prop::option::of(any::<u32>()),
        prop::option::of(label(&["youtube.com/@a", "youtube.com/@b"])),
    )
        .prop_map(
            |(
                (keywords, title_tokens, path_tokens, topic_tokens, taxonomy),
                (primary_topic_tokens, merge_hints, entities),
                (domain, language, doc_type, generic_landing),
                embedding,
                simhash,
                origin,
            )| {
                let tfidf: BTreeMap<String, f32> = keywords
                    .iter()
                    .enumerate()
                    .map(|(i, k)| (k.clone(), 0.1 + i as f32 * 0.1))
                    .collect();
                FeatureVector {
                    domain_tokens: domain
                        .split('.')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                    keywords,
                    title_tokens,
                    path_tokens,
                    topic_tokens,
                    taxonomy,
                    primary_topic_tokens,
                    merge_hints,
                    entities,
                    tfidf,
                    embedding,
                    simhash: simhash.map(|bits| Simhash { bits: bits as u64, width: 32 }),
                    domain,
                    language,
                    doc_type,
                    generic_landing,
                    origin,
                    ..FeatureVector::default()
                }
            },
        )
}

/// Every signal populated, no landing flag
fn full_vector() -> impl Strategy<Value = FeatureVector>
{
    (any_vector(), token_set(1), token_set(1), token_set(1), vec(0.1f32..1.0, 8), any::<u32>()).prop_map(
        |(mut v, a, b, c, emb, bits)| {
            v.keywords = a.clone();
            v.title_tokens = a.clone();
            v.path_tokens = b.clone();
            v.topic_tokens = b.clone();
            v.taxonomy = c.clone();
            v.primary_topic_tokens = b;
            v.merge_hints = c.clone();
            v.entities = c;
            v.tfidf = a
                .iter()
                .map(|k| (k.clone(), 0.5))
                .collect();
            v.domain = "example.com".into();
            v.domain_tokens = ["example".to_string()].into();
            v.language = "en".into();
            v.doc_type = "article".into();
            v.generic_landing = false;
            v.embedding = Some(emb);
            v.simhash = Some(Simhash { bits: bits as u64, width: 32 });
            v
        },
    )
}

proptest! {
    #[test]
    fn score_is_symmetric(a in any_vector(), b in any_vector())
    {
        let scorer = Scorer::default();
        let ab = scorer.score(&a, &b);
        let ba = scorer.score(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-6, "ab={} ba={}", ab, ba);
    }

    #[test]
    fn score_is_bounded(a in any_vector(), b in any_vector())
    {
        let s = Scorer::default().score(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s), "score out of range: {}", s);
    }

    #[test]
    fn identical_full_vectors_hit_the_ceiling(a in full_vector())
    {
        let scorer = Scorer::default();
        let ceiling = SimilarityWeights::default().total().min(1.0);
        let s = scorer.score(&a, &a);
        prop_assert!((s - ceiling).abs() < 1e-4, "self score {} vs ceiling {}", s, ceiling);
    }

    #[test]
    fn nothing_beats_self_similarity(a in full_vector(), b in any_vector())
    {
        let scorer = Scorer::default();
        prop_assert!(scorer.score(&a, &b) <= scorer.score(&a, &a) + 1e-4);
    }
}

#[test]
fn blank_vectors_score_zero()
{
    let blank = FeatureVector::default();
    assert_eq!(Scorer::default().score(&blank, &blank), 0.0);
}
