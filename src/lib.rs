//! **tabgroup** - Deterministic topic clustering for browser tabs and other short documents
//!
//! Multi-signal pair scoring, union-find clustering with a two-threshold hysteresis pass,
//! merge-only stabilization passes and optional, injectable oracles with deterministic fallbacks.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Subcommand handlers
pub mod cli_ext {
    /// `tgr cluster`
    pub mod cluster_cmd;

    /// `tgr eval`
    pub mod eval_cmd;
}

/// Clustering core - pure, synchronous stages over an in-memory corpus
pub mod core {
    /// Documents and optional semantic features
    pub mod model;
    pub use model::{Document, SemanticFeatures};

    /// Word tokenizer, stopwords and light stemming
    pub mod tokenize;
    pub use tokenize::{Script, Tokenizer};

    /// Regex rule table for taxonomy tags
    pub mod taxonomy;
    pub use taxonomy::{TaxonomyRule, TaxonomyTable};

    /// Feature vectors, TF-IDF, fallback embedding and simhash
    pub mod features;
    pub use features::{FeatureBuilder, FeatureConfig, FeatureVector};

    /// Weighted pair scoring and the per-run similarity cache
    pub mod similarity;
    pub use similarity::{PairScores, Scorer, SimilarityCache};

    /// Arena-indexed disjoint-set forest
    pub mod union_find;
    pub use union_find::UnionFind;

    /// Initial clustering: join/split hysteresis and singleton absorption
    pub mod engine;
    pub use engine::Thresholds;

    /// Merge-only stabilization passes
    pub mod stabilize;

    /// Cluster naming with a signature-keyed cache
    pub mod label;
    pub use label::{ClusterLabel, LabelBook};

    /// Ranked lists, centroid, representatives and signature per cluster
    pub mod enrich;
    pub use enrich::{ClusterRecord, EnrichConfig};

    /// Optional external collaborators and their error type
    pub mod oracle;
    pub use oracle::OracleError;

    /// End-to-end run
    pub mod pipeline;
    pub use pipeline::{ClusterOutcome, Pipeline};

    /// Pairwise, B-cubed and purity metrics
    pub mod eval;
    pub use eval::{EvalError, EvaluationResult, Scenario};
}

/// Infrastructure - configuration, file I/O and logging
pub mod infra {
    /// Layered configuration (file + TABGROUP_* env) with validation
    pub mod config;
    pub use config::{EngineConfig, init as config_init, load_config};

    /// Corpus, scenario and prediction files
    pub mod io;

    /// tracing-subscriber setup
    pub mod logging;
}

// Re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use core::{ClusterOutcome, Document, Pipeline};
pub use infra::{EngineConfig, load_config};
