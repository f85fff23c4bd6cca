//! Human-readable cluster names: label oracle with a signature-keyed cache,
//! falling back to title-cased centroid/taxonomy terms or "Group N".

use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::oracle::{LabelOracle, OracleError, settle};

/// Name and one-line description of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLabel
{
    pub name: String,
    pub description: String,
    /// Auto-generated "Group N" name
    #[serde(default)]
    pub placeholder: bool,
}

impl ClusterLabel
{
    /// Placeholder by flag or by shape
    pub fn is_placeholder(&self) -> bool
    {
        self.placeholder || is_placeholder_name(&self.name)
    }
}

/// What the label oracle (and the fallback) sees of a cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRequest
{
    pub signature: String,
    pub centroid_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub taxonomy: Vec<String>,
    pub size: usize,
    pub sample_titles: Vec<String>,
}

/// "Group N" for the cluster at `position` (0-based)
pub fn placeholder_name(position: usize) -> String
{
    format!("Group {}", position + 1)
}

/// Whether `name` looks like "Group <number>"
pub fn is_placeholder_name(name: &str) -> bool
{
    name.trim()
        .strip_prefix("Group ")
        .is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_digit())
        })
}

fn title_case(word: &str) -> String
{
    let mut chars = word.chars();
    match chars.next()
    {
        Some(first) => first
            .to_uppercase()
            .chain(chars)
            .collect(),
        None => String::new(),
    }
}

/// Deterministic name from the top centroid terms plus the leading taxonomy tag
pub fn fallback_label(
    request: &LabelRequest,
    position: usize,
) -> ClusterLabel
{
    let mut terms: Vec<&str> = Vec::new();
    for t in request
        .centroid_terms
        .iter()
        .chain(&request.keywords)
        .map(String::as_str)
    {
        if terms.len() == 2
        {
            break;
        }
        if !terms.contains(&t)
        {
            terms.push(t);
        }
    }
    if let Some(tag) = request
        .taxonomy
        .first()
        && !terms.contains(&tag.as_str())
    {
        terms.push(tag);
    }

    if terms.is_empty()
    {
        return ClusterLabel {
            name: placeholder_name(position),
            description: format!("{} uncategorized documents", request.size),
            placeholder: true,
        };
    }

    let name = terms
        .iter()
        .map(|t| title_case(t))
        .join(" ");
    let description = format!(
        "{} documents about {}",
        request.size,
        request
            .keywords
            .iter()
            .take(4)
            .join(", ")
    );

    ClusterLabel { name, description, placeholder: false }
}

/// Label source owned by the caller; the cache may outlive a single run
pub struct LabelBook
{
    oracle: Option<Arc<dyn LabelOracle>>,
    cache: Cache<String, ClusterLabel>,
    strict: bool,
}

impl LabelBook
{
    pub fn new(
        oracle: Option<Arc<dyn LabelOracle>>,
        strict: bool,
    ) -> Self
    {
        Self { oracle, cache: Cache::new(10_000), strict }
    }

    /// Name one cluster; oracle answers are cached by centroid signature
    pub fn label(
        &self,
        request: &LabelRequest,
        position: usize,
    ) -> Result<ClusterLabel>
    {
        let Some(oracle) = &self.oracle
        else
        {
            return Ok(fallback_label(request, position));
        };

        if let Some(hit) = self
            .cache
            .get(&request.signature)
        {
            trace!("Label cache hit - signature={}", request.signature);
            return Ok(hit);
        }

        let answer = oracle
            .label(request)
            .and_then(|l| {
                if l.name
                    .trim()
                    .is_empty()
                {
                    Err(OracleError::Malformed("empty label name".into()))
                }
                else
                {
                    Ok(ClusterLabel {
                        name: l
                            .name
                            .trim()
                            .to_string(),
                        description: l
                            .description
                            .trim()
                            .to_string(),
                        placeholder: l.placeholder,
                    })
                }
            });

        match settle(answer, self.strict, "label")?
        {
            Some(label) =>
            {
                self.cache
                    .insert(request.signature.clone(), label.clone());
                Ok(label)
            }
            None => Ok(fallback_label(request, position)),
        }
    }

    pub fn cached(&self) -> u64
    {
        self.cache
            .entry_count()
    }
}
