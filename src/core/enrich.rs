//! Cluster enrichment: ranked term lists, centroid, representatives,
//! dominant attributes and a stable signature.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;
use xxhash_rust::xxh64::xxh64;

use crate::core::features::FeatureVector;
use crate::core::label::{ClusterLabel, LabelRequest};
use crate::core::similarity::PairScores;

/// Sizes of the ranked lists attached to each cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig
{
    pub centroid_terms: usize,
    pub keywords: usize,
    pub tags: usize,
    /// Representatives per cluster (at most 2 are kept)
    pub representatives: usize,
    /// Centroid/keyword terms folded into the signature
    pub signature_terms: usize,
}

impl Default for EnrichConfig
{
    fn default() -> Self
    {
        Self { centroid_terms: 8, keywords: 10, tags: 6, representatives: 2, signature_terms: 6 }
    }
}

/// The label-facing part of a cluster, cheap enough to recompute per pass
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary
{
    pub centroid_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub taxonomy: Vec<String>,
    pub signature: String,
}

impl ClusterSummary
{
    pub fn request(
        &self,
        members: &[usize],
        vectors: &[FeatureVector],
    ) -> LabelRequest
    {
        LabelRequest {
            signature: self
                .signature
                .clone(),
            centroid_terms: self
                .centroid_terms
                .clone(),
            keywords: self
                .keywords
                .clone(),
            taxonomy: self
                .taxonomy
                .clone(),
            size: members.len(),
            sample_titles: members
                .iter()
                .take(5)
                .map(|&m| {
                    vectors[m]
                        .title
                        .clone()
                })
                .collect(),
        }
    }
}

/// Fully enriched cluster as emitted by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord
{
    pub id: usize,
    pub label: String,
    pub description: String,
    pub placeholder_label: bool,
    /// Positions in the input slice
    pub members: Vec<usize>,
    /// Caller-supplied document indices, parallel to `members`
    pub documents: Vec<usize>,
    pub centroid_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub taxonomy: Vec<String>,
    pub merge_hints: Vec<String>,
    pub entities: Vec<String>,
    pub representatives: SmallVec<[usize; 2]>,
    pub dominant_domain: String,
    pub dominant_language: String,
    pub dominant_topic: String,
    pub dominant_doc_type: String,
    pub generic_landing_ratio: f32,
    pub topic_purity: f32,
    pub signature: String,
}

impl ClusterRecord
{
    pub fn with_label(
        mut self,
        id: usize,
        label: ClusterLabel,
    ) -> Self
    {
        self.id = id;
        self.placeholder_label = label.is_placeholder();
        self.label = label.name;
        self.description = label.description;
        self
    }

    pub fn len(&self) -> usize
    {
        self.members
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.members
            .is_empty()
    }
}

/// Top `k` items by frequency; ties keep first-seen order
fn rank<'s>(
    items: impl IntoIterator<Item = &'s str>,
    k: usize,
) -> Vec<String>
{
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for item in items
    {
        if item.is_empty()
        {
            continue;
        }
        *counts
            .entry(item)
            .or_insert(0) += 1;
    }
    // Stable sort keeps insertion order among equal counts
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts
        .into_iter()
        .take(k)
        .map(|(item, _)| item.to_string())
        .collect()
}

/// Most frequent non-empty value, or "" when there is none
fn dominant<'s>(items: impl IntoIterator<Item = &'s str>) -> String
{
    rank(items, 1)
        .pop()
        .unwrap_or_default()
}

fn centroid(
    members: &[usize],
    vectors: &[FeatureVector],
    k: usize,
) -> Vec<String>
{
    let mut sums: BTreeMap<&str, f32> = BTreeMap::new();
    for &m in members
    {
        for (term, w) in &vectors[m].tfidf
        {
            *sums
                .entry(term.as_str())
                .or_insert(0.0) += *w;
        }
    }
    let size = members
        .len()
        .max(1) as f32;

    let mut terms: Vec<(&str, f32)> = sums
        .into_iter()
        .map(|(t, w)| (t, w / size))
        .collect();
    // BTreeMap order makes the term tie-break alphabetical
    terms.sort_by(|a, b| b.1.total_cmp(&a.1));
    terms
        .into_iter()
        .take(k)
        .map(|(t, _)| t.to_string())
        .collect()
}

fn signature(
    centroid_terms: &[String],
    keywords: &[String],
    n: usize,
) -> String
{
    let material = format!(
        "{}|{}",
        centroid_terms
            .iter()
            .take(n)
            .join(","),
        keywords
            .iter()
            .take(n)
            .join(",")
    );
    format!("{:016x}", xxh64(material.as_bytes(), 0))
}

/// Keep in-range members only; an out-of-range index is a programming error
fn in_range(
    members: &[usize],
    n: usize,
) -> Vec<usize>
{
    debug_assert!(
        members
            .iter()
            .all(|&m| m < n),
        "cluster references an out-of-range document"
    );
    let kept: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&m| m < n)
        .collect();
    if kept.len() != members.len()
    {
        warn!("Dropped {} out-of-range cluster members", members.len() - kept.len());
    }
    kept
}

/// Centroid, keywords, taxonomy and signature only
pub fn summarize(
    members: &[usize],
    vectors: &[FeatureVector],
    cfg: &EnrichConfig,
) -> ClusterSummary
{
    let members = in_range(members, vectors.len());
    let centroid_terms = centroid(&members, vectors, cfg.centroid_terms);
    let keywords = rank(
        members
            .iter()
            .flat_map(|&m| {
                vectors[m]
                    .keywords
                    .iter()
                    .map(String::as_str)
            }),
        cfg.keywords,
    );
    let taxonomy = rank(
        members
            .iter()
            .flat_map(|&m| {
                vectors[m]
                    .taxonomy_tags
                    .iter()
                    .map(String::as_str)
            }),
        cfg.tags,
    );
    let signature = signature(&centroid_terms, &keywords, cfg.signature_terms);

    ClusterSummary { centroid_terms, keywords, taxonomy, signature }
}

/// Members with the highest average similarity to the rest of the cluster
fn representatives(
    members: &[usize],
    scores: &mut PairScores<'_>,
    k: usize,
) -> SmallVec<[usize; 2]>
{
    let k = k.clamp(1, 2);
    if members.len() <= 1
    {
        return members
            .iter()
            .copied()
            .collect();
    }

    let mut avg: Vec<(usize, f32)> = Vec::with_capacity(members.len());
    for &m in members
    {
        let total: f32 = members
            .iter()
            .filter(|&&o| o != m)
            .map(|&o| scores.score(m, o))
            .sum();
        avg.push((m, total / (members.len() - 1) as f32));
    }
    avg.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(a.0.cmp(&b.0))
    });
    avg.into_iter()
        .take(k)
        .map(|(m, _)| m)
        .collect()
}

/// Full enrichment of one cluster; the label is attached separately
pub fn enrich(
    members: &[usize],
    scores: &mut PairScores<'_>,
    cfg: &EnrichConfig,
) -> ClusterRecord
{
    let vectors = scores.vectors();
    let members = in_range(members, vectors.len());
    let summary = summarize(&members, vectors, cfg);
    let size = members
        .len()
        .max(1) as f32;

    let of = |f: fn(&FeatureVector) -> &str| -> String {
        dominant(
            members
                .iter()
                .map(|&m| f(&vectors[m])),
        )
    };
    let dominant_domain = of(|v| v.domain.as_str());
    let dominant_language = of(|v| v.language.as_str());
    let dominant_topic = of(|v| v.primary_topic.as_str());
    let dominant_doc_type = of(|v| v.doc_type.as_str());

    let merge_hints = rank(
        members
            .iter()
            .flat_map(|&m| {
                vectors[m]
                    .merge_hints
                    .iter()
                    .map(String::as_str)
            }),
        cfg.tags,
    );
    let entities = rank(
        members
            .iter()
            .flat_map(|&m| {
                vectors[m]
                    .entities
                    .iter()
                    .map(String::as_str)
            }),
        cfg.tags,
    );

    let generic = members
        .iter()
        .filter(|&&m| vectors[m].generic_landing)
        .count();
    let on_topic = if dominant_topic.is_empty()
    {
        0
    }
    else
    {
        members
            .iter()
            .filter(|&&m| vectors[m].primary_topic == dominant_topic)
            .count()
    };

    let representatives = representatives(&members, scores, cfg.representatives);

    ClusterRecord {
        id: 0,
        label: String::new(),
        description: String::new(),
        placeholder_label: false,
        documents: members
            .iter()
            .map(|&m| vectors[m].doc_index)
            .collect(),
        members,
        centroid_terms: summary.centroid_terms,
        keywords: summary.keywords,
        taxonomy: summary.taxonomy,
        merge_hints,
        entities,
        representatives,
        dominant_domain,
        dominant_language,
        dominant_topic,
        dominant_doc_type,
        generic_landing_ratio: generic as f32 / size,
        topic_purity: on_topic as f32 / size,
        signature: summary.signature,
    }
}
