use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::engine::Thresholds;
use crate::core::enrich::EnrichConfig;
use crate::core::features::FeatureConfig;
use crate::core::similarity::{Penalties, SimilarityWeights};
use crate::core::taxonomy::{TaxonomyRule, TaxonomyTable, default_rules};

/// Config files probed in the working directory, first hit wins
pub const CONFIG_FILES: [&str; 4] = ["tabgroup.toml", "tabgroup.yaml", "tabgroup.json", ".tabgroup.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    /// Abort on hard oracle failures instead of falling back
    pub strict_oracles: bool,

    /// Join/split and stabilization thresholds
    pub thresholds: Thresholds,

    /// Sub-signal weights of the pair score
    pub weights: SimilarityWeights,

    /// Multiplicative penalties
    pub penalties: Penalties,

    /// Tokenizer and feature extraction
    pub features: FeatureConfig,

    /// Cluster enrichment list sizes
    pub enrich: EnrichConfig,

    /// Domain/content taxonomy rules, applied in order
    pub taxonomy: Vec<TaxonomyRule>,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            strict_oracles: false,
            thresholds: Thresholds::default(),
            weights: SimilarityWeights::default(),
            penalties: Penalties::default(),
            features: FeatureConfig::default(),
            enrich: EnrichConfig::default(),
            taxonomy: default_rules(),
        }
    }
}

fn unit(
    name: &str,
    v: f32,
) -> Result<()>
{
    if !(0.0..=1.0).contains(&v)
    {
        bail!("{} must be within [0, 1], got {}", name, v);
    }
    Ok(())
}

impl EngineConfig
{
    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()>
    {
        let t = &self.thresholds;
        if t.split >= t.join
        {
            bail!("thresholds.split ({}) must be below thresholds.join ({})", t.split, t.join);
        }
        for (name, v) in [
            ("thresholds.join", t.join),
            ("thresholds.split", t.split),
            ("thresholds.corroborate_hint_overlap", t.corroborate_hint_overlap),
            ("thresholds.corroborate_topic_overlap", t.corroborate_topic_overlap),
            ("thresholds.corroborate_topic_taxonomy", t.corroborate_topic_taxonomy),
            ("thresholds.corroborate_simhash", t.corroborate_simhash),
            ("thresholds.corroborate_embedding", t.corroborate_embedding),
            ("thresholds.cross_group", t.cross_group),
            ("thresholds.cross_keyword", t.cross_keyword),
            ("thresholds.cross_topic", t.cross_topic),
            ("thresholds.cross_taxonomy", t.cross_taxonomy),
            ("thresholds.label_name", t.label_name),
            ("thresholds.label_vector", t.label_vector),
            ("thresholds.verifier_floor", t.verifier_floor),
            ("thresholds.verifier_confidence", t.verifier_confidence),
        ]
        {
            unit(name, v)?;
        }

        let p = &self.penalties;
        for (name, v) in [
            ("penalties.language_mismatch", p.language_mismatch),
            ("penalties.generic_one", p.generic_one),
            ("penalties.generic_both", p.generic_both),
            ("penalties.entity_mismatch", p.entity_mismatch),
            ("penalties.topic_mismatch", p.topic_mismatch),
            ("penalties.topic_overlap_floor", p.topic_overlap_floor),
        ]
        {
            unit(name, v)?;
        }

        let w = &self.weights;
        for (name, v) in [
            ("weights.keywords", w.keywords),
            ("weights.topics", w.topics),
            ("weights.title", w.title),
            ("weights.tfidf", w.tfidf),
            ("weights.embedding", w.embedding),
            ("weights.simhash", w.simhash),
            ("weights.taxonomy", w.taxonomy),
            ("weights.url_path", w.url_path),
            ("weights.domain_exact", w.domain_exact),
            ("weights.domain_tokens", w.domain_tokens),
            ("weights.language", w.language),
            ("weights.merge_hints", w.merge_hints),
            ("weights.doc_type", w.doc_type),
            ("weights.entities", w.entities),
            ("weights.primary_topic", w.primary_topic),
            ("weights.identity_bonus", w.identity_bonus),
        ]
        {
            unit(name, v)?;
        }
        if w.total() <= 0.0
        {
            bail!("weights must not all be zero");
        }

        let f = &self.features;
        if f.simhash_bits == 0 || f.simhash_bits > 64
        {
            bail!("features.simhash_bits must be within 1..=64, got {}", f.simhash_bits);
        }
        if f.embedding_dims == 0
        {
            bail!("features.embedding_dims must be positive");
        }

        TaxonomyTable::compile(&self.taxonomy).context("Invalid taxonomy rule")?;
        Ok(())
    }
}

/// Load configuration from the first config file found plus `TABGROUP_*`
pub fn load_config() -> Result<EngineConfig>
{
    load_config_from(None)
}

/// Like [`load_config`] but an explicit file replaces the probe
pub fn load_config_from(explicit: Option<&Path>) -> Result<EngineConfig>
{
    let mut builder = config::Config::builder();

    match explicit
    {
        Some(path) =>
        {
            if !path.exists()
            {
                bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(config::File::from(path));
        }
        None =>
        {
            for path in &CONFIG_FILES
            {
                if Path::new(path).exists()
                {
                    builder = builder.add_source(config::File::with_name(path));
                    break;
                }
            }
        }
    }

    // TABGROUP_THRESHOLDS__JOIN=0.5 etc.
    builder = builder.add_source(
        config::Environment::with_prefix("TABGROUP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: EngineConfig = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    parsed
        .validate()
        .context("Invalid configuration")?;
    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        bail!("Config file already exists at {}. Use --force to overwrite.", config_path.display());
    }

    let config = EngineConfig::default();
    let toml_string = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_validate()
    {
        EngineConfig::default()
            .validate()
            .unwrap();
    }

    #[test]
    fn inverted_thresholds_are_rejected()
    {
        let mut cfg = EngineConfig::default();
        cfg.thresholds
            .split = 0.5;
        let err = cfg
            .validate()
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("split")
        );
    }

    #[test]
    fn each_weight_must_be_a_unit_value()
    {
        for bad in [-0.1, f32::NAN, f32::INFINITY, 1.5]
        {
            let mut cfg = EngineConfig::default();
            cfg.weights
                .simhash = bad;
            let err = cfg
                .validate()
                .unwrap_err();
            assert!(
                err.to_string()
                    .contains("weights.simhash"),
                "{}",
                err
            );
        }

        // A negative weight the others outweigh is still refused
        let mut cfg = EngineConfig::default();
        cfg.weights
            .identity_bonus = -0.03;
        assert!(
            cfg.validate()
                .is_err()
        );
    }

    #[test]
    fn bad_taxonomy_regex_is_rejected()
    {
        let mut cfg = EngineConfig::default();
        cfg.taxonomy
            .push(TaxonomyRule { pattern: "(".into(), field: Default::default(), tags: vec!["x".into()] });
        assert!(
            cfg.validate()
                .is_err()
        );
    }

    #[test]
    fn default_config_round_trips_through_toml()
    {
        let text = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(
            back.thresholds,
            EngineConfig::default().thresholds
        );
    }

    #[test]
    fn partial_file_overrides_only_named_keys()
    {
        let cfg: EngineConfig = toml::from_str("[thresholds]\njoin = 0.5\n").unwrap();
        assert_eq!(cfg.thresholds.join, 0.5);
        assert_eq!(cfg.thresholds.split, 0.35);
        assert_eq!(cfg.features, FeatureConfig::default());
    }
}
