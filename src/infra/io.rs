//! Corpus, scenario and prediction files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::eval::Scenario;
use crate::core::model::Document;

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(raw: &Path) -> Result<PathBuf>
{
    let text = raw.to_string_lossy();
    let expanded = shellexpand::full(&text).with_context(|| format!("Failed to expand path {}", text))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Read and parse one JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T>
{
    let path = expand_path(path)?;
    let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// JSON array of documents; missing indices become positions
pub fn read_corpus(path: &Path) -> Result<Vec<Document>>
{
    let mut docs: Vec<Document> = read_json(path)?;
    for (pos, doc) in docs
        .iter_mut()
        .enumerate()
    {
        doc.index
            .get_or_insert(pos);
    }
    debug!("Loaded corpus - path={}, docs={}", path.display(), docs.len());
    Ok(docs)
}

pub fn read_scenario(path: &Path) -> Result<Scenario>
{
    let scenario: Scenario = read_json(path)?;
    debug!("Loaded scenario - name={}, tabs={}", scenario.name, scenario.tabs.len());
    Ok(scenario)
}

/// Cluster ids may be written as strings or numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClusterId
{
    Text(String),
    Number(serde_json::Number),
}

/// JSON object `url -> cluster id`
pub fn read_predictions(path: &Path) -> Result<BTreeMap<String, String>>
{
    let raw: BTreeMap<String, ClusterId> = read_json(path)?;
    Ok(raw
        .into_iter()
        .map(|(url, id)| {
            let id = match id
            {
                ClusterId::Text(s) => s,
                ClusterId::Number(n) => n.to_string(),
            };
            (url, id)
        })
        .collect())
}
