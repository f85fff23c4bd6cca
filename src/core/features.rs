//! Feature builder: documents -> feature vectors + shared document frequencies.
//!
//! Every document yields a vector, even an empty one. Missing semantic
//! features are replaced by deterministic fallbacks derived from the title,
//! content and URL shape, so downstream stages never know whether a feature
//! came from an oracle or not.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use xxhash_rust::xxh64::xxh64;

use crate::core::model::{Document, SemanticFeatures};
use crate::core::taxonomy::TaxonomyTable;
use crate::core::tokenize::{Script, Tokenizer, is_generic_merge_word};

/// Tunables for feature extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig
{
    /// Max tokens per document fed into TF-IDF
    pub token_budget: usize,
    /// Max chars of page content sampled before tokenizing
    pub content_sample_chars: usize,
    pub min_token_len: usize,
    pub min_stem_len: usize,
    /// Width of the hashed fallback embedding
    pub embedding_dims: usize,
    /// Tokens hashed into the fallback embedding
    pub embedding_tokens: usize,
    /// Simhash fingerprint width (1..=64)
    pub simhash_bits: u32,
    /// Scripts admitted by the tokenizer besides ASCII
    pub scripts: Vec<Script>,
}

impl Default for FeatureConfig
{
    fn default() -> Self
    {
        Self {
            token_budget: 1200,
            content_sample_chars: 8000,
            min_token_len: 3,
            min_stem_len: 4,
            embedding_dims: 64,
            embedding_tokens: 48,
            simhash_bits: 32,
            scripts: vec![Script::LatinExtended, Script::Greek],
        }
    }
}

/// Fixed-width simhash fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Simhash
{
    pub bits: u64,
    pub width: u32,
}

impl Simhash
{
    /// Bit-weighted majority vote over token hashes; `None` for an empty set
    pub fn of<'a>(
        tokens: impl IntoIterator<Item = &'a String>,
        width: u32,
    ) -> Option<Self>
    {
        let width = width.clamp(1, 64);
        let mut weights = vec![0i64; width as usize];
        let mut seen = false;

        for t in tokens
        {
            seen = true;
            let h = xxh64(t.as_bytes(), 0);
            for (bit, w) in weights
                .iter_mut()
                .enumerate()
            {
                if (h >> bit) & 1 == 1
                {
                    *w += 1;
                }
                else
                {
                    *w -= 1;
                }
            }
        }

        if !seen
        {
            return None;
        }

        let bits = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w >= 0)
            .fold(0u64, |acc, (bit, _)| acc | (1 << bit));

        Some(Self { bits, width })
    }

    /// `1 - hamming / width`; fingerprints of different widths never match
    pub fn similarity(
        &self,
        other: &Simhash,
    ) -> f32
    {
        if self.width != other.width
        {
            return 0.0;
        }
        let distance = (self.bits ^ other.bits).count_ones();
        1.0 - distance as f32 / self.width as f32
    }
}

/// Derived per-document representation consumed by the scorer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector
{
    /// Position in the corpus (the arena index used everywhere downstream)
    pub position: usize,
    /// Caller-side document index
    pub doc_index: usize,
    pub keywords: BTreeSet<String>,
    pub title_tokens: BTreeSet<String>,
    pub path_tokens: BTreeSet<String>,
    pub topic_tokens: BTreeSet<String>,
    pub taxonomy: BTreeSet<String>,
    pub domain_tokens: BTreeSet<String>,
    pub primary_topic_tokens: BTreeSet<String>,
    pub merge_hints: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    /// Sparse TF-IDF weights, key-sorted
    pub tfidf: BTreeMap<String, f32>,
    /// L2-normalized embedding
    pub embedding: Option<Vec<f32>>,
    pub simhash: Option<Simhash>,
    pub domain: String,
    pub language: String,
    pub primary_topic: String,
    pub doc_type: String,
    pub generic_landing: bool,
    pub origin: Option<String>,
    /// Tags in rule order (for display)
    pub taxonomy_tags: Vec<String>,
    /// Title as given (for labels and verifier summaries)
    pub title: String,
    pub url: String,
}

impl FeatureVector
{
    /// True when the vector carries no usable signal at all
    pub fn is_blank(&self) -> bool
    {
        self.keywords
            .is_empty()
            && self
                .tfidf
                .is_empty()
            && self
                .domain
                .is_empty()
            && self
                .path_tokens
                .is_empty()
            && self
                .embedding
                .is_none()
    }
}

/// Corpus-wide document frequencies
#[derive(Debug, Clone, Default)]
pub struct DocFrequency
{
    docs: usize,
    df: HashMap<String, usize>,
}

impl DocFrequency
{
    fn from_streams(streams: &[Vec<String>]) -> Self
    {
        let mut df: HashMap<String, usize> = HashMap::new();
        for stream in streams
        {
            let unique: BTreeSet<&String> = stream
                .iter()
                .collect();
            for term in unique
            {
                *df.entry(term.clone())
                    .or_insert(0) += 1;
            }
        }
        Self { docs: streams.len(), df }
    }

    /// `ln((N + 1) / (df + 1)) + 1`
    pub fn idf(
        &self,
        term: &str,
    ) -> f32
    {
        let df = self
            .df
            .get(term)
            .copied()
            .unwrap_or(0);
        ((self.docs as f32 + 1.0) / (df as f32 + 1.0)).ln() + 1.0
    }

    pub fn documents(&self) -> usize
    {
        self.docs
    }

    pub fn vocabulary(&self) -> usize
    {
        self.df
            .len()
    }
}

/// Intermediate per-document state before corpus statistics exist
struct Draft
{
    vector: FeatureVector,
    stream: Vec<String>,
    oracle_embedding: Option<Vec<f32>>,
}

/// Builds feature vectors for a whole corpus at once
pub struct FeatureBuilder<'a>
{
    config: &'a FeatureConfig,
    taxonomy: &'a TaxonomyTable,
    tokenizer: Tokenizer,
}

impl<'a> FeatureBuilder<'a>
{
    pub fn new(
        config: &'a FeatureConfig,
        taxonomy: &'a TaxonomyTable,
    ) -> Self
    {
        let tokenizer = Tokenizer::new(
            config.min_token_len,
            config.min_stem_len,
            config
                .scripts
                .clone(),
        );
        Self { config, taxonomy, tokenizer }
    }

    pub fn tokenizer(&self) -> &Tokenizer
    {
        &self.tokenizer
    }

    /// Produce one vector per document plus the shared frequency table
    #[instrument(skip_all, fields(docs = docs.len()))]
    pub fn build(
        &self,
        docs: &[Document],
    ) -> (Vec<FeatureVector>, DocFrequency)
    {
        let drafts: Vec<Draft> = docs
            .iter()
            .enumerate()
            .map(|(pos, d)| self.draft(pos, d))
            .collect();

        let streams: Vec<Vec<String>> = drafts
            .iter()
            .map(|d| {
                d.stream
                    .clone()
            })
            .collect();
        let df = DocFrequency::from_streams(&streams);

        let vectors: Vec<FeatureVector> = drafts
            .into_iter()
            .map(|d| self.finish(d, &df))
            .collect();

        debug!(
            "Feature build done - docs={}, vocabulary={}, blank={}",
            vectors.len(),
            df.vocabulary(),
            vectors
                .iter()
                .filter(|v| v.is_blank())
                .count()
        );

        (vectors, df)
    }

    fn draft(
        &self,
        position: usize,
        doc: &Document,
    ) -> Draft
    {
        let tk = &self.tokenizer;
        let host = doc.host();
        let segments = doc.path_segments();
        let sample = sample_chars(&doc.content, self.config.content_sample_chars);

        // Taxonomy from domain and visible text
        let taxonomy_tags = self
            .taxonomy
            .tags_for(&host, &format!("{} {}", doc.title, sample));

        // Semantic features: oracle-supplied or fallback
        let mut semantic = match &doc.semantic
        {
            Some(s) => s.clone(),
            None => self.fallback_semantics(doc, &host, segments.as_deref(), sample),
        };
        if semantic
            .doc_type
            .trim()
            .is_empty()
        {
            semantic.doc_type = infer_doc_type(segments.as_deref());
        }

        let title_tokens = tk.token_set(&doc.title);
        let path_tokens = segments
            .as_ref()
            .map(|s| tk.token_set_of(s))
            .unwrap_or_default();
        let primary_topic_tokens = tk.token_set(&semantic.primary_topic);

        let mut topic_tokens = primary_topic_tokens.clone();
        topic_tokens.extend(tk.token_set_of(&semantic.subtopics));
        topic_tokens.extend(tk.token_set(&semantic.doc_type));

        let merge_hints = without_generic(tk.token_set_of(&semantic.merge_hints));
        let entities = tk.token_set_of(&semantic.entities);
        let taxonomy = tk.token_set_of(&taxonomy_tags);

        // Keyword set: every descriptive field, minus generic filler
        let mut keywords = tk.token_set(&doc.title);
        keywords.extend(tk.token_set(&doc.description));
        keywords.extend(tk.token_set_of(&doc.headings));
        keywords.extend(tk.token_set_of(&doc.meta_keywords));
        keywords.extend(tk.token_set_of(&doc.summary_bullets));
        keywords.extend(primary_topic_tokens.iter().cloned());
        keywords.extend(tk.token_set_of(&semantic.subtopics));
        keywords.extend(tk.token_set_of(&semantic.summary_bullets));
        keywords.extend(merge_hints.iter().cloned());
        keywords.extend(entities.iter().cloned());
        keywords.extend(taxonomy.iter().cloned());
        let keywords = without_generic(keywords);

        // Bounded token stream for TF-IDF
        let mut stream = tk.tokens(&doc.title);
        stream.extend(tk.tokens(&doc.description));
        for part in doc
            .headings
            .iter()
            .chain(&doc.meta_keywords)
            .chain(&semantic.merge_hints)
            .chain(&semantic.subtopics)
            .chain(std::iter::once(&semantic.primary_topic))
            .chain(&semantic.entities)
        {
            stream.extend(tk.tokens(part));
        }
        stream.extend(tk.tokens(sample));
        stream.truncate(self.config.token_budget);

        let vector = FeatureVector {
            position,
            doc_index: doc
                .index
                .unwrap_or(position),
            keywords,
            title_tokens,
            path_tokens,
            topic_tokens,
            taxonomy,
            domain_tokens: domain_tokens(&host),
            primary_topic_tokens,
            merge_hints,
            entities,
            tfidf: BTreeMap::new(),
            embedding: None,
            simhash: None,
            domain: host,
            language: doc
                .language
                .trim()
                .to_lowercase(),
            primary_topic: semantic
                .primary_topic
                .trim()
                .to_lowercase(),
            doc_type: semantic
                .doc_type
                .trim()
                .to_lowercase(),
            generic_landing: semantic.is_generic_landing,
            origin: doc.origin(),
            taxonomy_tags,
            title: doc
                .title
                .clone(),
            url: doc
                .url
                .clone(),
        };

        Draft { vector, stream, oracle_embedding: doc.embedding.clone() }
    }

    fn finish(
        &self,
        draft: Draft,
        df: &DocFrequency,
    ) -> FeatureVector
    {
        let Draft { mut vector, stream, oracle_embedding } = draft;

        // Term frequency normalized by stream length, weighted by IDF
        if !stream.is_empty()
        {
            let len = stream.len() as f32;
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for t in stream
            {
                *counts
                    .entry(t)
                    .or_insert(0) += 1;
            }
            vector.tfidf = counts
                .into_iter()
                .map(|(term, c)| {
                    let w = c as f32 / len * df.idf(&term);
                    (term, w)
                })
                .collect();
        }

        vector.embedding = oracle_embedding
            .and_then(l2_normalize)
            .or_else(|| self.fallback_embedding(&vector.tfidf));

        vector.simhash = Simhash::of(&vector.keywords, self.config.simhash_bits);

        vector
    }

    /// Deterministic semantic features when no oracle answered
    fn fallback_semantics(
        &self,
        doc: &Document,
        host: &str,
        segments: Option<&[String]>,
        sample: &str,
    ) -> SemanticFeatures
    {
        let tk = &self.tokenizer;

        // Frequency-ranked tokens; title counts triple, ties keep first occurrence
        let sample = sample.to_string();
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for t in tk.tokens(&doc.title)
        {
            *counts
                .entry(t)
                .or_insert(0) += 3;
        }
        for part in std::iter::once(&doc.description)
            .chain(&doc.headings)
            .chain(std::iter::once(&sample))
        {
            for t in tk.tokens(part)
            {
                *counts
                    .entry(t)
                    .or_insert(0) += 1;
            }
        }
        counts.retain(|t, _| !is_generic_merge_word(t));
        counts.sort_by(|_, a, _, b| b.cmp(a));

        let top: Vec<String> = counts
            .keys()
            .take(2)
            .cloned()
            .collect();
        let primary_topic = if top.is_empty()
        {
            domain_segment(host)
        }
        else
        {
            top.join(" ")
        };

        let doc_type = infer_doc_type(segments);
        let is_generic_landing = doc_type == "landing";

        SemanticFeatures { primary_topic, doc_type, is_generic_landing, ..Default::default() }
    }

    /// Hash up to N top-weighted tokens (`token:position`) into a fixed accumulator
    fn fallback_embedding(
        &self,
        tfidf: &BTreeMap<String, f32>,
    ) -> Option<Vec<f32>>
    {
        let dims = self
            .config
            .embedding_dims
            .max(1);
        let mut ranked: Vec<(&String, &f32)> = tfidf
            .iter()
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(a.1)
                .then_with(|| a.0.cmp(b.0))
        });

        let mut acc = vec![0f32; dims];
        for (pos, (token, _)) in ranked
            .into_iter()
            .take(self.config.embedding_tokens)
            .enumerate()
        {
            let key = format!("{}:{}", token, pos);
            let bucket = (xxh64(key.as_bytes(), 0) % dims as u64) as usize;
            acc[bucket] += 1.0;
        }

        l2_normalize(acc)
    }
}

/// L2-normalize; rejects zero or non-finite vectors
pub fn l2_normalize(mut v: Vec<f32>) -> Option<Vec<f32>>
{
    if v.is_empty()
        || v.iter()
            .any(|x| !x.is_finite())
    {
        return None;
    }
    let norm = v
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt();
    if norm <= f32::EPSILON
    {
        return None;
    }
    for x in v.iter_mut()
    {
        *x /= norm;
    }
    Some(v)
}

/// Doc type from URL path shape; empty when there is no usable URL
pub fn infer_doc_type(segments: Option<&[String]>) -> String
{
    let Some(segments) = segments
    else
    {
        return String::new();
    };

    let lowered: Vec<String> = segments
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    let kind = if lowered.is_empty()
        || (lowered.len() == 1
            && matches!(lowered[0].as_str(), "index.html" | "index.php" | "home" | "en" | "index"))
    {
        "landing"
    }
    else if lowered
        .iter()
        .any(|s| {
            matches!(
                s.as_str(),
                "docs" | "doc" | "documentation" | "reference" | "api" | "manual" | "guide" | "guides" | "wiki"
            )
        })
    {
        "docs"
    }
    else if lowered
        .iter()
        .any(|s| {
            matches!(
                s.as_str(),
                "category" | "categories" | "tag" | "tags" | "topic" | "topics" | "section" | "sections" | "collections"
            )
        })
    {
        "category"
    }
    else
    {
        "article"
    };

    kind.to_string()
}

fn without_generic(set: BTreeSet<String>) -> BTreeSet<String>
{
    set.into_iter()
        .filter(|t| !is_generic_merge_word(t))
        .collect()
}

/// Public-suffix-ish labels ignored when tokenizing hosts
fn is_tld_label(label: &str) -> bool
{
    matches!(
        label,
        "com" | "org" | "net" | "io" | "co" | "uk" | "de" | "fr" | "gov" | "edu" | "dev" | "app" | "www" | "gr" | "eu"
    )
}

/// Host labels minus "www" and common suffixes
fn domain_tokens(host: &str) -> BTreeSet<String>
{
    host.split(|c: char| c == '.' || c == '-')
        .filter(|l| l.len() >= 2 && !is_tld_label(l))
        .map(str::to_string)
        .collect()
}

/// The most specific non-suffix label ("docs.python.org" -> "python")
fn domain_segment(host: &str) -> String
{
    host.split('.')
        .filter(|l| !l.is_empty() && !is_tld_label(l))
        .last()
        .unwrap_or_default()
        .to_string()
}

/// First `max` chars of `s` on a char boundary
fn sample_chars(
    s: &str,
    max: usize,
) -> &str
{
    match s
        .char_indices()
        .nth(max)
    {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::taxonomy::default_rules;

    fn build(docs: &[Document]) -> Vec<FeatureVector>
    {
        let cfg = FeatureConfig::default();
        let table = TaxonomyTable::compile(&default_rules()).unwrap();
        FeatureBuilder::new(&cfg, &table)
            .build(docs)
            .0
    }

    #[test]
    fn empty_document_yields_blank_vector()
    {
        let v = build(&[Document::default()]);
        assert!(v[0].is_blank());
        assert!(
            v[0].simhash
                .is_none()
        );
        assert!(
            v[0].doc_type
                .is_empty()
        );
        assert!(
            v[0].topic_tokens
                .is_empty()
        );
    }

    #[test]
    fn keywords_drop_generic_filler()
    {
        let d = Document::new("Latest News: Rust Compiler Overview", "https://blog.example.com/rust/compiler");
        let v = build(&[d]);
        assert!(
            v[0].keywords
                .contains("rust")
        );
        assert!(
            v[0].keywords
                .contains("compiler")
        );
        assert!(
            !v[0]
                .keywords
                .contains("news")
        );
        assert!(
            !v[0]
                .keywords
                .contains("overview")
        );
    }

    #[test]
    fn taxonomy_tags_join_keywords()
    {
        let d = Document::new("tokio-rs/tokio", "https://github.com/tokio-rs/tokio");
        let v = build(&[d]);
        assert_eq!(v[0].taxonomy_tags, vec!["code", "software"]);
        assert!(
            v[0].keywords
                .contains("software")
        );
        assert_eq!(v[0].domain, "github.com");
    }

    #[test]
    fn idf_prefers_rare_terms()
    {
        let docs = vec![
            Document::new("rust async runtime", "https://a.example/x").with_content("tokio executor"),
            Document::new("rust borrow checker", "https://b.example/y"),
        ];
        let cfg = FeatureConfig::default();
        let table = TaxonomyTable::compile(&[]).unwrap();
        let (_, df) = FeatureBuilder::new(&cfg, &table).build(&docs);
        assert!(df.idf("tokio") > df.idf("rust"));
        assert_eq!(df.documents(), 2);
    }

    #[test]
    fn fallback_embedding_is_normalized()
    {
        let d = Document::new("Rust ownership explained", "https://example.com/rust/ownership")
            .with_content("borrowing lifetimes references moves");
        let v = build(&[d]);
        let emb = v[0]
            .embedding
            .as_ref()
            .unwrap();
        assert_eq!(emb.len(), 64);
        let norm: f32 = emb
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn oracle_embedding_is_normalized_or_rejected()
    {
        assert_eq!(l2_normalize(vec![3.0, 4.0]), Some(vec![0.6, 0.8]));
        assert_eq!(l2_normalize(vec![0.0, 0.0]), None);
        assert_eq!(l2_normalize(vec![f32::NAN, 1.0]), None);
    }

    #[test]
    fn simhash_identical_sets_match()
    {
        let a: BTreeSet<String> = ["rust", "tokio", "async"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let h1 = Simhash::of(&a, 32).unwrap();
        let h2 = Simhash::of(&a, 32).unwrap();
        assert_eq!(h1.similarity(&h2), 1.0);
        assert!(Simhash::of(&BTreeSet::new(), 32).is_none());
    }

    #[test]
    fn doc_type_from_path_shape()
    {
        let kind = |v: &[&str]| -> String {
            let owned: Vec<String> = v
                .iter()
                .map(|s| s.to_string())
                .collect();
            infer_doc_type(Some(owned.as_slice()))
        };
        assert_eq!(kind(&[]), "landing");
        assert_eq!(kind(&["docs", "intro"]), "docs");
        assert_eq!(kind(&["category", "rust"]), "category");
        assert_eq!(kind(&["2024", "my-post"]), "article");
        assert_eq!(infer_doc_type(None), "");
    }

    #[test]
    fn fallback_primary_topic_uses_title_tokens_then_domain()
    {
        let v = build(&[
            Document::new("Sourdough starter", "https://bread.example.com/a/b"),
            Document::new("", "https://docs.python.org/"),
        ]);
        assert_eq!(v[0].primary_topic, "sourdough starter");
        assert_eq!(v[1].primary_topic, "python");
        assert!(v[1].generic_landing);
    }
}
