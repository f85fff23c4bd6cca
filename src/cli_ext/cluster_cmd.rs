//! `tgr cluster`: load a corpus, run the pipeline, print the outcome.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::instrument;

use crate::cli::{AppContext, ClusterArgs, ClusterFormat};
use crate::core::model::Document;
use crate::core::pipeline::{ClusterOutcome, Pipeline};
use crate::infra::config::{EngineConfig, load_config_from};
use crate::infra::io::{expand_path, read_corpus};

/// Config from file/env plus any threshold flags
pub fn effective_config(
    ctx: &AppContext,
    join: Option<f32>,
    split: Option<f32>,
) -> Result<EngineConfig>
{
    let mut config = load_config_from(ctx.config.as_deref())?;
    if let Some(j) = join
    {
        config.thresholds.join = j;
    }
    if let Some(s) = split
    {
        config.thresholds.split = s;
    }
    Ok(config)
}

#[instrument(skip_all)]
pub fn run(
    args: ClusterArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = effective_config(ctx, args.join, args.split)?;
    let corpus = read_corpus(&args.corpus)?;
    let outcome = Pipeline::new(config)?.run(&corpus)?;

    let rendered = match args.format
    {
        ClusterFormat::Json => serde_json::to_string_pretty(&outcome).context("Failed to serialize clusters")?,
        ClusterFormat::Text => render_text(&outcome, &corpus, ctx),
    };

    emit(&rendered, args.output.as_deref(), ctx)
}

fn render_text(
    outcome: &ClusterOutcome,
    corpus: &[Document],
    ctx: &AppContext,
) -> String
{
    let mut out = String::new();
    for c in &outcome.clusters
    {
        let header = format!("{} ({} docs)", c.label, c.len());
        if ctx.no_color
        {
            let _ = writeln!(out, "{}  {}", header, c.signature);
        }
        else
        {
            let _ = writeln!(
                out,
                "{}  {}",
                header
                    .cyan()
                    .bold(),
                c.signature
                    .dimmed()
            );
        }

        for &m in &c.members
        {
            let Some(doc) = corpus.get(m)
            else
            {
                continue;
            };
            let title = if doc
                .title
                .trim()
                .is_empty()
            {
                "(untitled)"
            }
            else
            {
                doc.title
                    .trim()
            };
            if ctx.no_color
            {
                let _ = writeln!(out, "  - {}  {}", title, doc.url);
            }
            else
            {
                let _ = writeln!(
                    out,
                    "  - {}  {}",
                    title,
                    doc.url
                        .dimmed()
                );
            }
        }
    }

    let s = &outcome.stats;
    let _ = writeln!(out, "\n{} documents, {} clusters", s.documents, s.final_clusters);
    out
}

/// Print to stdout or write to `output`
pub fn emit(
    rendered: &str,
    output: Option<&Path>,
    ctx: &AppContext,
) -> Result<()>
{
    match output
    {
        Some(path) =>
        {
            let path = expand_path(path)?;
            std::fs::write(&path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            if !ctx.quiet
            {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
