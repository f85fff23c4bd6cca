//! Read-only quality metrics against a gold partition.
//!
//! The universe is every url present in either map. A url missing from one
//! side is its own unique cluster on that side, so it can only cost
//! precision or recall, never add to them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Gold scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario
{
    pub name: String,
    pub notes: String,
    pub tabs: Vec<ScenarioTab>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioTab
{
    pub url: String,
    pub gold: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError
{
    #[error("scenario '{0}' has no valid {{url, gold}} entries")]
    NoValidEntries(String),
}

impl Scenario
{
    /// `url -> gold label`, skipping blank entries; first occurrence wins
    pub fn gold_map(&self) -> Result<BTreeMap<String, String>, EvalError>
    {
        let mut map = BTreeMap::new();
        for tab in &self.tabs
        {
            let url = tab
                .url
                .trim();
            let gold = tab
                .gold
                .trim();
            if url.is_empty() || gold.is_empty()
            {
                continue;
            }
            map.entry(url.to_string())
                .or_insert_with(|| gold.to_string());
        }
        if map.is_empty()
        {
            return Err(EvalError::NoValidEntries(
                self.name
                    .clone(),
            ));
        }
        Ok(map)
    }
}

/// Pair-counting agreement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PairwiseMetrics
{
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl PairwiseMetrics
{
    /// FP / (TP + FP + FN)
    pub fn over_merge_rate(&self) -> f64
    {
        ratio(self.false_positives, self.true_positives + self.false_positives + self.false_negatives)
    }

    /// FN / (TP + FP + FN)
    pub fn under_cluster_rate(&self) -> f64
    {
        ratio(self.false_negatives, self.true_positives + self.false_positives + self.false_negatives)
    }
}

/// Per-document averaged precision/recall
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BCubedMetrics
{
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Majority-gold-label share of one predicted cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterPurity
{
    pub cluster: String,
    pub size: usize,
    /// Empty when no member has a gold label
    pub majority: String,
    pub purity: f64,
}

/// Flat, JSON-friendly report for one scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult
{
    pub scenario: String,
    pub documents: usize,
    pub gold_clusters: usize,
    pub predicted_clusters: usize,
    pub missing_predictions: usize,
    pub pairwise_precision: f64,
    pub pairwise_recall: f64,
    pub pairwise_f1: f64,
    pub bcubed_precision: f64,
    pub bcubed_recall: f64,
    pub bcubed_f1: f64,
    pub over_merge_rate: f64,
    pub under_cluster_rate: f64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub mean_purity: f64,
}

fn ratio(
    num: u64,
    den: u64,
) -> f64
{
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(
    p: f64,
    r: f64,
) -> f64
{
    if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
}

/// Both sides aligned over the url universe; `None` means "unique cluster"
struct Aligned<'m>
{
    gold: Vec<Option<&'m str>>,
    pred: Vec<Option<&'m str>>,
}

impl<'m> Aligned<'m>
{
    fn new(
        gold: &'m BTreeMap<String, String>,
        pred: &'m BTreeMap<String, String>,
    ) -> Self
    {
        let universe: BTreeSet<&str> = gold
            .keys()
            .chain(pred.keys())
            .map(String::as_str)
            .collect();
        Self {
            gold: universe
                .iter()
                .map(|u| {
                    gold.get(*u)
                        .map(String::as_str)
                })
                .collect(),
            pred: universe
                .iter()
                .map(|u| {
                    pred.get(*u)
                        .map(String::as_str)
                })
                .collect(),
        }
    }

    fn len(&self) -> usize
    {
        self.gold
            .len()
    }

    fn same(
        side: &[Option<&str>],
        i: usize,
        j: usize,
    ) -> bool
    {
        i == j || matches!((side[i], side[j]), (Some(a), Some(b)) if a == b)
    }
}

/// Pairwise precision/recall/F1 over all unordered pairs
pub fn eval_pairwise(
    gold: &BTreeMap<String, String>,
    pred: &BTreeMap<String, String>,
) -> PairwiseMetrics
{
    let a = Aligned::new(gold, pred);
    let (mut tp, mut fp, mut fn_) = (0u64, 0u64, 0u64);

    for i in 0..a.len()
    {
        for j in (i + 1)..a.len()
        {
            let g = Aligned::same(&a.gold, i, j);
            let p = Aligned::same(&a.pred, i, j);
            match (g, p)
            {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) =>
                {}
            }
        }
    }

    // No predicted links: perfect only if nothing was missed
    let precision = if tp + fp == 0
    {
        if fn_ == 0 { 1.0 } else { 0.0 }
    }
    else
    {
        ratio(tp, tp + fp)
    };
    let recall = if tp + fn_ == 0
    {
        if fp == 0 { 1.0 } else { 0.0 }
    }
    else
    {
        ratio(tp, tp + fn_)
    };

    PairwiseMetrics {
        precision,
        recall,
        f1: f1(precision, recall),
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
    }
}

/// B-cubed precision/recall/F1 averaged over documents
pub fn eval_bcubed(
    gold: &BTreeMap<String, String>,
    pred: &BTreeMap<String, String>,
) -> BCubedMetrics
{
    let a = Aligned::new(gold, pred);
    let n = a.len();
    if n == 0
    {
        return BCubedMetrics::default();
    }

    let (mut p_sum, mut r_sum) = (0.0f64, 0.0f64);
    for i in 0..n
    {
        let (mut both, mut in_pred, mut in_gold) = (0usize, 0usize, 0usize);
        for j in 0..n
        {
            let g = Aligned::same(&a.gold, i, j);
            let p = Aligned::same(&a.pred, i, j);
            in_gold += g as usize;
            in_pred += p as usize;
            both += (g && p) as usize;
        }
        p_sum += both as f64 / in_pred as f64;
        r_sum += both as f64 / in_gold as f64;
    }

    let precision = p_sum / n as f64;
    let recall = r_sum / n as f64;
    BCubedMetrics { precision, recall, f1: f1(precision, recall) }
}

/// Purity of every predicted cluster, ordered by cluster id
pub fn cluster_purity(
    gold: &BTreeMap<String, String>,
    pred: &BTreeMap<String, String>,
) -> Vec<ClusterPurity>
{
    let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (url, cluster) in pred
    {
        members
            .entry(cluster.as_str())
            .or_default()
            .push(url.as_str());
    }

    members
        .into_iter()
        .map(|(cluster, urls)| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for url in &urls
            {
                if let Some(label) = gold.get(*url)
                {
                    *counts
                        .entry(label.as_str())
                        .or_insert(0) += 1;
                }
            }
            // Highest count; alphabetical among ties
            let (majority, top) = counts
                .iter()
                .fold(("", 0usize), |best, (label, &c)| if c > best.1 { (label, c) } else { best });
            // Unlabeled members are unique labels of their own
            let top = top.max(1);
            ClusterPurity {
                cluster: cluster.to_string(),
                size: urls.len(),
                majority: majority.to_string(),
                purity: top as f64 / urls.len() as f64,
            }
        })
        .collect()
}

/// Every metric for one scenario and one prediction map
pub fn evaluate(
    scenario: &Scenario,
    pred: &BTreeMap<String, String>,
) -> Result<EvaluationResult, EvalError>
{
    let gold = scenario.gold_map()?;
    let pairwise = eval_pairwise(&gold, pred);
    let bcubed = eval_bcubed(&gold, pred);
    let purity = cluster_purity(&gold, pred);

    let documents = gold
        .keys()
        .chain(pred.keys())
        .collect::<BTreeSet<_>>()
        .len();
    let mean_purity = if purity.is_empty()
    {
        0.0
    }
    else
    {
        purity
            .iter()
            .map(|p| p.purity)
            .sum::<f64>()
            / purity.len() as f64
    };

    Ok(EvaluationResult {
        scenario: scenario
            .name
            .clone(),
        documents,
        gold_clusters: gold
            .values()
            .collect::<BTreeSet<_>>()
            .len(),
        predicted_clusters: purity.len(),
        missing_predictions: gold
            .keys()
            .filter(|u| !pred.contains_key(*u))
            .count(),
        pairwise_precision: pairwise.precision,
        pairwise_recall: pairwise.recall,
        pairwise_f1: pairwise.f1,
        bcubed_precision: bcubed.precision,
        bcubed_recall: bcubed.recall,
        bcubed_f1: bcubed.f1,
        over_merge_rate: pairwise.over_merge_rate(),
        under_cluster_rate: pairwise.under_cluster_rate(),
        true_positives: pairwise.true_positives,
        false_positives: pairwise.false_positives,
        false_negatives: pairwise.false_negatives,
        mean_purity,
    })
}
