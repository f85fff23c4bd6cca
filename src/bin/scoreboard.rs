//! Local scoreboard for clustering quality.
//! Produces one JSON line per scenario in the `--out` file.
//!
//! Metrics:
//!   - pairwise / B-cubed precision, recall and F1 against the gold scenario
//!   - over-merge and under-cluster rates
//!   - mean cluster purity
//!   - deterministic: true if every run produced the same partition and signatures
//!
//! Usage:
//!   cargo run --bin scoreboard -- \
//!     --plan fixtures/plan.json \
//!     --out scoreboard.jsonl \
//!     [--config tabgroup.toml]
//!
//! Plan paths are resolved relative to the plan file.

use std::fs; // read/write files
use std::io::Write; // write JSONL lines
use std::path::{Path, PathBuf}; // paths

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize}; // JSON serde
use tabgroup::core::eval::evaluate;
use tabgroup::infra::config::load_config_from;
use tabgroup::infra::io::{read_corpus, read_scenario};
use tabgroup::{ClusterOutcome, Pipeline};

// --------------------------
// Plan file data structures
// --------------------------

#[derive(Deserialize)]
struct Plan
{
    // List of independent scenarios to execute
    scenarios: Vec<PlanEntry>,
}

#[derive(Deserialize)]
struct PlanEntry
{
    // Unique name for reporting; defaults to the scenario's own name
    name: Option<String>,

    // Gold scenario file
    scenario: PathBuf,

    // Corpus to cluster
    corpus: PathBuf,

    // Number of runs; two or more enables the determinism check
    #[serde(default = "default_runs")]
    runs: usize,
}

fn default_runs() -> usize
{
    2
}

// --------------------------
// Output record per scenario
// --------------------------

#[derive(Serialize)]
struct ScoreRow
{
    // Scenario identity
    name: String,
    // Corpus shape
    documents: usize,
    clusters: usize,
    // Aggregate metrics
    pairwise_precision: f64,
    pairwise_recall: f64,
    pairwise_f1: f64,
    bcubed_f1: f64,
    over_merge_rate: f64,
    under_cluster_rate: f64,
    mean_purity: f64,
    missing_predictions: usize,
    deterministic: bool,
}

// --------------------------
// Helpers
// --------------------------

fn flag_value<'a>(
    args: &'a [String],
    flag: &str,
) -> anyhow::Result<Option<&'a String>>
{
    match args
        .iter()
        .position(|a| a == flag)
    {
        Some(idx) => args
            .get(idx + 1)
            .map(Some)
            .ok_or_else(|| anyhow!("{} needs a value", flag)),
        None => Ok(None),
    }
}

fn resolve(
    base: &Path,
    p: &Path,
) -> PathBuf
{
    if p.is_absolute() { p.to_path_buf() } else { base.join(p) }
}

/// Same partition and same signatures, run over run
fn all_identical(outcomes: &[ClusterOutcome]) -> bool
{
    outcomes
        .windows(2)
        .all(|w| w[0].partition() == w[1].partition() && w[0].signatures() == w[1].signatures())
}

// --------------------------
// Main: plan -> JSONL
// --------------------------

fn main() -> anyhow::Result<()>
{
    // Read args: --plan <file> --out <file> [--config <file>]
    let args = std::env::args()
        .skip(1)
        .collect::<Vec<_>>();
    // Simple manual parsing to avoid bringing in Clap here
    let plan_path = PathBuf::from(flag_value(&args, "--plan")?.ok_or_else(|| anyhow!("missing --plan"))?);
    let out_path = flag_value(&args, "--out")?.ok_or_else(|| anyhow!("missing --out"))?;
    let config_path = flag_value(&args, "--config")?.map(PathBuf::from);

    // Load and parse the plan file
    let plan_bytes = fs::read(&plan_path).with_context(|| format!("Failed to read plan {}", plan_path.display()))?;
    let plan: Plan = serde_json::from_slice(&plan_bytes).context("Failed to parse plan")?;
    let base = plan_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let config = load_config_from(config_path.as_deref())?;
    let pipeline = Pipeline::new(config)?;

    // Prepare output file (truncate if exists)
    let mut out = fs::File::create(out_path)?;

    for entry in &plan.scenarios
    {
        if entry.runs == 0
        {
            bail!("runs must be at least 1");
        }
        let scenario = read_scenario(&resolve(&base, &entry.scenario))?;
        let corpus = read_corpus(&resolve(&base, &entry.corpus))?;

        let outcomes = (0..entry.runs)
            .map(|_| pipeline.run(&corpus))
            .collect::<anyhow::Result<Vec<_>>>()?;

        // Use the first run as the measured output
        let first = &outcomes[0];
        let result = evaluate(&scenario, &first.predictions_by_url(&corpus))?;

        let row = ScoreRow {
            name: entry
                .name
                .clone()
                .unwrap_or_else(|| {
                    scenario
                        .name
                        .clone()
                }),
            documents: corpus.len(),
            clusters: first
                .clusters
                .len(),
            pairwise_precision: result.pairwise_precision,
            pairwise_recall: result.pairwise_recall,
            pairwise_f1: result.pairwise_f1,
            bcubed_f1: result.bcubed_f1,
            over_merge_rate: result.over_merge_rate,
            under_cluster_rate: result.under_cluster_rate,
            mean_purity: result.mean_purity,
            missing_predictions: result.missing_predictions,
            deterministic: all_identical(&outcomes),
        };

        // Emit one compact JSON line per scenario
        let line = serde_json::to_string(&row)?;
        writeln!(out, "{line}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn args(items: &[&str]) -> Vec<String>
    {
        items
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn flag_values_are_read_after_the_flag()
    {
        let a = args(&["--plan", "p.json", "--out", "o.jsonl"]);
        assert_eq!(
            flag_value(&a, "--plan")
                .unwrap()
                .map(String::as_str),
            Some("p.json")
        );
        assert_eq!(flag_value(&a, "--config").unwrap(), None);
    }

    #[test]
    fn dangling_flag_is_an_error()
    {
        let a = args(&["--out"]);
        assert!(flag_value(&a, "--out").is_err());
    }

    #[test]
    fn relative_plan_paths_follow_the_plan()
    {
        let base = Path::new("/plans");
        assert_eq!(resolve(base, Path::new("a.json")), PathBuf::from("/plans/a.json"));
        assert_eq!(resolve(base, Path::new("/abs/a.json")), PathBuf::from("/abs/a.json"));
    }
}
