//! Optional external collaborators.
//!
//! The clustering core never calls these directly; the pipeline consults
//! them before (topic, embedding) or between (verifier, label) the pure
//! stages and falls back to deterministic behavior when they are absent or
//! fail.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::features::FeatureVector;
use crate::core::label::{ClusterLabel, LabelRequest};
use crate::core::model::{Document, SemanticFeatures};

/// Why an oracle did not produce an answer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError
{
    /// Ran out of time; always recoverable
    #[error("oracle timed out")]
    Timeout,

    /// Not installed, not reachable, or deliberately withheld; always recoverable
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Hard failure; fatal in strict mode
    #[error("oracle failed: {0}")]
    Failed(String),

    /// Answered with something unusable; fatal in strict mode
    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
}

impl OracleError
{
    /// Soft errors fall back even in strict mode
    pub fn is_soft(&self) -> bool
    {
        matches!(self, OracleError::Timeout | OracleError::Unavailable(_))
    }
}

/// Infers semantic features for one document
pub trait TopicOracle: Send + Sync
{
    fn infer(
        &self,
        doc: &Document,
    ) -> Result<SemanticFeatures, OracleError>;
}

/// Produces an embedding for one document (any length; normalized downstream)
pub trait EmbeddingOracle: Send + Sync
{
    fn embed(
        &self,
        doc: &Document,
    ) -> Result<Vec<f32>, OracleError>;
}

/// Names a cluster from its centroid/keyword/taxonomy summary
pub trait LabelOracle: Send + Sync
{
    fn label(
        &self,
        request: &LabelRequest,
    ) -> Result<ClusterLabel, OracleError>;
}

/// Judges whether two documents share a topic
pub trait VerifierOracle: Send + Sync
{
    fn verify(
        &self,
        a: &DocSummary,
        b: &DocSummary,
    ) -> Result<Verdict, OracleError>;
}

/// Compact description of a document handed to the verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSummary
{
    pub title: String,
    pub url: String,
    pub domain: String,
    pub topic: String,
    pub keywords: Vec<String>,
}

impl DocSummary
{
    pub fn of(v: &FeatureVector) -> Self
    {
        Self {
            title: v
                .title
                .clone(),
            url: v
                .url
                .clone(),
            domain: v
                .domain
                .clone(),
            topic: v
                .primary_topic
                .clone(),
            keywords: v
                .keywords
                .iter()
                .take(8)
                .cloned()
                .collect(),
        }
    }
}

/// Verifier answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict
{
    pub same_topic: bool,
    pub confidence: f32,
    pub reason: String,
}

/// Apply the fallback policy to an oracle result.
///
/// `Ok(None)` means "use the deterministic fallback". Hard failures only
/// surface as errors when `strict` is set.
pub fn settle<T>(
    result: Result<T, OracleError>,
    strict: bool,
    what: &str,
) -> Result<Option<T>>
{
    match result
    {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_soft() =>
        {
            debug!("{} oracle fell back - {}", what, e);
            Ok(None)
        }
        Err(e) if strict => bail!("{} oracle failed in strict mode: {}", what, e),
        Err(e) =>
        {
            warn!("{} oracle error, using fallback - {}", what, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn soft_errors_always_fall_back()
    {
        let r: Result<u8, OracleError> = Err(OracleError::Timeout);
        assert_eq!(settle(r, true, "topic").unwrap(), None);

        let r: Result<u8, OracleError> = Err(OracleError::Unavailable("offline".into()));
        assert_eq!(settle(r, true, "topic").unwrap(), None);
    }

    #[test]
    fn hard_errors_fail_only_in_strict_mode()
    {
        let r: Result<u8, OracleError> = Err(OracleError::Failed("boom".into()));
        assert_eq!(settle(r.clone(), false, "label").unwrap(), None);
        let err = settle(r, true, "label").unwrap_err();
        assert!(
            err.to_string()
                .contains("label oracle failed")
        );
    }

    #[test]
    fn answers_pass_through()
    {
        let r: Result<u8, OracleError> = Ok(7);
        assert_eq!(settle(r, true, "embedding").unwrap(), Some(7));
    }
}
