//! End-to-end clustering run.
//!
//! Oracles are consulted only at the edges: topic/embedding before feature
//! building, the verifier and the label oracle inside the stabilization
//! loop. Everything in between is the deterministic core.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::engine::{self, EngineStats};
use crate::core::enrich::{self, ClusterRecord};
use crate::core::features::{FeatureBuilder, FeatureVector};
use crate::core::label::{ClusterLabel, LabelBook};
use crate::core::model::Document;
use crate::core::oracle::{EmbeddingOracle, LabelOracle, TopicOracle, VerifierOracle, settle};
use crate::core::similarity::{PairScores, Scorer};
use crate::core::stabilize;
use crate::core::taxonomy::TaxonomyTable;
use crate::infra::config::EngineConfig;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats
{
    pub documents: usize,
    pub vocabulary: usize,
    #[serde(flatten)]
    pub engine: EngineStats,
    pub cross_merges: usize,
    pub origin_merges: usize,
    pub verifier_attachments: usize,
    pub label_merges: usize,
    pub final_clusters: usize,
    pub cached_pairs: usize,
}

/// Clusters, per-document assignment and counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterOutcome
{
    pub clusters: Vec<ClusterRecord>,
    /// Cluster id for every input position
    pub assignments: Vec<usize>,
    pub stats: RunStats,
}

impl ClusterOutcome
{
    /// Member positions per cluster, in cluster order
    pub fn partition(&self) -> Vec<Vec<usize>>
    {
        self.clusters
            .iter()
            .map(|c| {
                c.members
                    .clone()
            })
            .collect()
    }

    pub fn signatures(&self) -> Vec<&str>
    {
        self.clusters
            .iter()
            .map(|c| c.signature.as_str())
            .collect()
    }

    /// `url -> cluster id` for evaluation; blank urls are skipped, first wins
    pub fn predictions_by_url(
        &self,
        docs: &[Document],
    ) -> BTreeMap<String, String>
    {
        let mut out = BTreeMap::new();
        for (pos, doc) in docs
            .iter()
            .enumerate()
        {
            let url = doc
                .url
                .trim();
            if url.is_empty()
            {
                continue;
            }
            if let Some(id) = self
                .assignments
                .get(pos)
            {
                out.entry(url.to_string())
                    .or_insert_with(|| id.to_string());
            }
        }
        out
    }
}

/// Configured clustering pipeline; reusable across runs
pub struct Pipeline
{
    config: EngineConfig,
    taxonomy: TaxonomyTable,
    scorer: Scorer,
    topic: Option<Arc<dyn TopicOracle>>,
    embedding: Option<Arc<dyn EmbeddingOracle>>,
    verifier: Option<Arc<dyn VerifierOracle>>,
    labels: LabelBook,
}

impl Pipeline
{
    pub fn new(config: EngineConfig) -> Result<Self>
    {
        config
            .validate()
            .context("Invalid engine configuration")?;
        let taxonomy = TaxonomyTable::compile(&config.taxonomy)?;
        let scorer = Scorer::new(config.weights, config.penalties);
        let labels = LabelBook::new(None, config.strict_oracles);

        Ok(Self { config, taxonomy, scorer, topic: None, embedding: None, verifier: None, labels })
    }

    pub fn with_topic_oracle(
        mut self,
        oracle: Arc<dyn TopicOracle>,
    ) -> Self
    {
        self.topic = Some(oracle);
        self
    }

    pub fn with_embedding_oracle(
        mut self,
        oracle: Arc<dyn EmbeddingOracle>,
    ) -> Self
    {
        self.embedding = Some(oracle);
        self
    }

    pub fn with_label_oracle(
        mut self,
        oracle: Arc<dyn LabelOracle>,
    ) -> Self
    {
        self.labels = LabelBook::new(Some(oracle), self.config.strict_oracles);
        self
    }

    pub fn with_verifier_oracle(
        mut self,
        oracle: Arc<dyn VerifierOracle>,
    ) -> Self
    {
        self.verifier = Some(oracle);
        self
    }

    pub fn config(&self) -> &EngineConfig
    {
        &self.config
    }

    /// Fill in oracle-provided semantics and embeddings where absent
    fn resolve(
        &self,
        docs: &[Document],
    ) -> Result<Vec<Document>>
    {
        if self
            .topic
            .is_none()
            && self
                .embedding
                .is_none()
        {
            return Ok(docs.to_vec());
        }

        let strict = self
            .config
            .strict_oracles;
        docs.iter()
            .enumerate()
            .map(|(pos, doc)| {
                let mut doc = doc.clone();
                if doc
                    .semantic
                    .is_none()
                    && let Some(oracle) = &self.topic
                {
                    doc.semantic = settle(oracle.infer(&doc), strict, "topic")
                        .with_context(|| format!("document {} ({})", pos, doc.url))?;
                }
                if doc
                    .embedding
                    .is_none()
                    && let Some(oracle) = &self.embedding
                {
                    doc.embedding = settle(oracle.embed(&doc), strict, "embedding")
                        .with_context(|| format!("document {} ({})", pos, doc.url))?;
                }
                Ok(doc)
            })
            .collect()
    }

    fn label_all(
        &self,
        clusters: &[Vec<usize>],
        vectors: &[FeatureVector],
    ) -> Result<Vec<ClusterLabel>>
    {
        clusters
            .iter()
            .enumerate()
            .map(|(pos, members)| {
                let request = enrich::summarize(members, vectors, &self.config.enrich).request(members, vectors);
                self.labels
                    .label(&request, pos)
                    .with_context(|| format!("labeling cluster {} ({})", pos, request.signature))
            })
            .collect()
    }

    /// Cluster, stabilize, name and enrich `docs`
    #[instrument(skip_all, fields(docs = docs.len()))]
    pub fn run(
        &self,
        docs: &[Document],
    ) -> Result<ClusterOutcome>
    {
        let docs = self.resolve(docs)?;
        let builder = FeatureBuilder::new(&self.config.features, &self.taxonomy);
        let (vectors, df) = builder.build(&docs);

        let mut scores = PairScores::new(&vectors, &self.scorer);
        scores.prime();

        let t = &self.config.thresholds;
        let (mut clusters, mut engine_stats) = engine::initial_clusters(&mut scores, t);
        engine_stats.absorbed_singletons = engine::absorb_singletons(&mut clusters, &mut scores, t);

        let mut stats = RunStats {
            documents: docs.len(),
            vocabulary: df.vocabulary(),
            engine: engine_stats,
            ..RunStats::default()
        };

        // Cross, origin, verifier and label passes until a round merges nothing
        let (labels, passes) = stabilize::converge(
            &mut clusters,
            &mut scores,
            builder.tokenizer(),
            t,
            self.verifier
                .as_deref(),
            self.config
                .strict_oracles,
            |current| self.label_all(current, &vectors),
        )?;
        stats.cross_merges = passes.cross;
        stats.origin_merges = passes.origin;
        stats.verifier_attachments = passes.verified;
        stats.label_merges = passes.label;

        let records: Vec<ClusterRecord> = clusters
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(id, (members, label))| {
                enrich::enrich(members, &mut scores, &self.config.enrich).with_label(id, label)
            })
            .collect();

        let mut assignments = vec![usize::MAX; docs.len()];
        for record in &records
        {
            for &m in &record.members
            {
                assignments[m] = record.id;
            }
        }
        debug_assert!(
            !assignments.contains(&usize::MAX),
            "every document must land in a cluster"
        );

        stats.final_clusters = records.len();
        stats.cached_pairs = scores
            .cache()
            .len();

        info!(
            "Clustered {} documents into {} clusters (borderline={}, absorbed={}, cross={}, origin={}, verified={}, label={})",
            stats.documents,
            stats.final_clusters,
            stats
                .engine
                .borderline_pairs,
            stats
                .engine
                .absorbed_singletons,
            stats.cross_merges,
            stats.origin_merges,
            stats.verifier_attachments,
            stats.label_merges
        );

        Ok(ClusterOutcome { clusters: records, assignments, stats })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn empty_corpus_yields_no_clusters()
    {
        let pipeline = Pipeline::new(EngineConfig::default()).unwrap();
        let outcome = pipeline
            .run(&[])
            .unwrap();
        assert!(
            outcome
                .clusters
                .is_empty()
        );
        assert!(
            outcome
                .assignments
                .is_empty()
        );
    }

    #[test]
    fn predictions_skip_blank_urls()
    {
        let docs = vec![Document::new("a", "https://a.test/x"), Document::new("b", "")];
        let pipeline = Pipeline::new(EngineConfig::default()).unwrap();
        let outcome = pipeline
            .run(&docs)
            .unwrap();
        let pred = outcome.predictions_by_url(&docs);
        assert_eq!(pred.len(), 1);
        assert!(pred.contains_key("https://a.test/x"));
    }

    #[test]
    fn invalid_config_is_rejected()
    {
        let mut cfg = EngineConfig::default();
        cfg.thresholds
            .join = 0.1;
        assert!(Pipeline::new(cfg).is_err());
    }
}
