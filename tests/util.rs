//! Shared test utilities for integration tests
//!
//! Provides corpus fixtures and helpers used across multiple test files.

#![allow(dead_code)]

use assert_fs::prelude::*;
use serde_json::json;
use tabgroup::core::model::Document;
use tabgroup::core::similarity::{Penalties, Scorer, SimilarityWeights};

/// Document with title, url and content in English
pub fn doc(
    title: &str,
    url: &str,
    content: &str,
) -> Document
{
    Document::new(title, url)
        .with_content(content)
        .with_language("en")
}

/// Three obvious pairs with no vocabulary shared across pairs.
///
/// Each pair repeats title, content, domain and path; only the URL fragment
/// differs.
pub fn gold_corpus() -> Vec<Document>
{
    let tokio = "Tokio scheduler workers steal tasks across threads; reactor drives sockets and timers.";
    let bread = "Sourdough loaves need levain, flour, water hydration and patient overnight fermentation.";
    let marathon = "Marathon plan builds weekly mileage with tempo intervals, easy recovery jogs and tapering.";

    vec![
        doc("Tokio runtime scheduler internals", "https://tokio.rs/blog/scheduler-internals#part-1", tokio),
        doc("Sourdough bread hydration basics", "https://bakery.example/recipes/sourdough-hydration#a", bread),
        doc("Marathon training plan beginners", "https://running.example/plans/marathon-beginners#a", marathon),
        doc("Tokio runtime scheduler internals", "https://tokio.rs/blog/scheduler-internals#part-2", tokio),
        doc("Sourdough bread hydration basics", "https://bakery.example/recipes/sourdough-hydration#b", bread),
        doc("Marathon training plan beginners", "https://running.example/plans/marathon-beginners#b", marathon),
    ]
}

/// Gold partition of [`gold_corpus`] as a scenario JSON value
pub fn gold_scenario() -> serde_json::Value
{
    let docs = gold_corpus();
    let gold = ["tokio", "bread", "marathon", "tokio", "bread", "marathon"];
    json!({
        "name": "three-pairs",
        "notes": "three obvious pairs",
        "tabs": docs
            .iter()
            .zip(gold)
            .map(|(d, g)| json!({ "url": d.url, "gold": g }))
            .collect::<Vec<_>>(),
    })
}

/// Temp dir holding `corpus.json` and `scenario.json` for the gold corpus
pub fn gold_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("corpus.json")
        .write_str(&serde_json::to_string_pretty(&gold_corpus()).expect("corpus json"))
        .expect("write corpus");
    tmp.child("scenario.json")
        .write_str(&serde_json::to_string_pretty(&gold_scenario()).expect("scenario json"))
        .expect("write scenario");
    tmp
}

/// Scorer whose pair score is exactly the embedding cosine
pub fn embedding_scorer() -> Scorer
{
    let weights = SimilarityWeights {
        keywords: 0.0,
        topics: 0.0,
        title: 0.0,
        tfidf: 0.0,
        embedding: 1.0,
        simhash: 0.0,
        taxonomy: 0.0,
        url_path: 0.0,
        domain_exact: 0.0,
        domain_tokens: 0.0,
        language: 0.0,
        merge_hints: 0.0,
        doc_type: 0.0,
        entities: 0.0,
        primary_topic: 0.0,
        identity_bonus: 0.0,
    };
    Scorer::new(weights, Penalties::default())
}

/// Unit vector in the plane at cosine `cos` from `[1, 0]`
pub fn toward(cos: f32) -> Vec<f32>
{
    vec![cos, (1.0 - cos * cos).sqrt()]
}
