//! `tgr eval`: score predictions against a gold scenario.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::cli::{AppContext, EvalArgs, EvalFormat};
use crate::cli_ext::cluster_cmd::effective_config;
use crate::core::eval::{EvaluationResult, cluster_purity, evaluate};
use crate::core::pipeline::Pipeline;
use crate::infra::io::{read_corpus, read_predictions, read_scenario};

#[derive(Tabled)]
struct MetricRow
{
    metric: &'static str,
    value: String,
}

#[derive(Tabled)]
struct PurityRow
{
    cluster: String,
    size: usize,
    majority: String,
    purity: String,
}

fn metric_rows(r: &EvaluationResult) -> Vec<MetricRow>
{
    let f = |v: f64| format!("{:.3}", v);
    vec![
        MetricRow { metric: "documents", value: r.documents.to_string() },
        MetricRow { metric: "gold clusters", value: r.gold_clusters.to_string() },
        MetricRow { metric: "predicted clusters", value: r.predicted_clusters.to_string() },
        MetricRow { metric: "missing predictions", value: r.missing_predictions.to_string() },
        MetricRow { metric: "pairwise precision", value: f(r.pairwise_precision) },
        MetricRow { metric: "pairwise recall", value: f(r.pairwise_recall) },
        MetricRow { metric: "pairwise f1", value: f(r.pairwise_f1) },
        MetricRow { metric: "b-cubed precision", value: f(r.bcubed_precision) },
        MetricRow { metric: "b-cubed recall", value: f(r.bcubed_recall) },
        MetricRow { metric: "b-cubed f1", value: f(r.bcubed_f1) },
        MetricRow { metric: "over-merge rate", value: f(r.over_merge_rate) },
        MetricRow { metric: "under-cluster rate", value: f(r.under_cluster_rate) },
        MetricRow { metric: "mean purity", value: f(r.mean_purity) },
    ]
}

#[instrument(skip_all)]
pub fn run(
    args: EvalArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let scenario = read_scenario(&args.scenario)?;

    let predictions: BTreeMap<String, String> = match (&args.predictions, &args.corpus)
    {
        (Some(path), _) => read_predictions(path)?,
        (None, Some(path)) =>
        {
            let config = effective_config(ctx, None, None)?;
            let corpus = read_corpus(path)?;
            Pipeline::new(config)?
                .run(&corpus)?
                .predictions_by_url(&corpus)
        }
        (None, None) => bail!("either --predictions or --corpus is required"),
    };

    let result = evaluate(&scenario, &predictions)
        .with_context(|| format!("Failed to evaluate {}", args.scenario.display()))?;

    match args.format
    {
        EvalFormat::Json =>
        {
            println!("{}", serde_json::to_string_pretty(&result).context("Failed to serialize metrics")?);
        }
        EvalFormat::Table =>
        {
            println!("{}", Table::new(metric_rows(&result)));
            if args.purity
            {
                let gold = scenario.gold_map()?;
                let rows: Vec<PurityRow> = cluster_purity(&gold, &predictions)
                    .into_iter()
                    .map(|p| PurityRow {
                        cluster: p.cluster,
                        size: p.size,
                        majority: p.majority,
                        purity: format!("{:.3}", p.purity),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}
