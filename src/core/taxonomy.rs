//! Rule table mapping domains (or page text) to taxonomy tags.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which document field a rule is matched against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField
{
    #[default]
    Domain,
    /// Title plus content sample
    Content,
}

/// One configurable `regex -> tags` rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRule
{
    /// Case-insensitive regular expression
    pub pattern: String,
    /// Field the pattern is matched against
    #[serde(default)]
    pub field: RuleField,
    /// Tags contributed when the pattern matches
    pub tags: Vec<String>,
}

impl TaxonomyRule
{
    fn new(
        pattern: &str,
        tags: &[&str],
    ) -> Self
    {
        Self {
            pattern: pattern.to_string(),
            field: RuleField::Domain,
            tags: tags
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Built-in rules used when the config does not override them
pub fn default_rules() -> Vec<TaxonomyRule>
{
    vec![
        TaxonomyRule::new(r"(^|\.)(github|gitlab|bitbucket|codeberg)\.", &["code", "software"]),
        TaxonomyRule::new(r"(^|\.)(stackoverflow|stackexchange|serverfault|superuser)\.", &["code", "questions"]),
        TaxonomyRule::new(r"(^|\.)(docs\.rs|crates\.io|npmjs|pypi|readthedocs)", &["code", "documentation"]),
        TaxonomyRule::new(r"(^|\.)(youtube|vimeo|twitch|dailymotion)\.", &["video"]),
        TaxonomyRule::new(r"(^|\.)(arxiv|scholar\.google|semanticscholar|acm|ieee|springer|nature)\.", &["research", "academic"]),
        TaxonomyRule::new(r"(^|\.)(wikipedia|wiktionary|britannica)\.", &["reference", "encyclopedia"]),
        TaxonomyRule::new(r"(^|\.)(reddit|news\.ycombinator|lobste\.rs|mastodon|twitter|x)\.", &["social", "discussion"]),
        TaxonomyRule::new(r"(^|\.)(amazon|ebay|etsy|aliexpress|bestbuy)\.", &["shopping"]),
        TaxonomyRule::new(r"(^|\.)(nytimes|bbc|reuters|theguardian|cnn|apnews|bloomberg)\.", &["journalism"]),
        TaxonomyRule::new(r"(^|\.)(spotify|soundcloud|bandcamp)\.", &["music", "audio"]),
        TaxonomyRule::new(r"(^|\.)(maps\.google|openstreetmap|booking|airbnb|tripadvisor)\.", &["travel"]),
        TaxonomyRule {
            pattern: r"\b(recipe|ingredients?|baking|cuisine)\b".to_string(),
            field: RuleField::Content,
            tags: vec!["cooking".to_string()],
        },
    ]
}

/// Compiled rule table
#[derive(Debug, Clone)]
pub struct TaxonomyTable
{
    rules: Vec<(Regex, RuleField, Vec<String>)>,
}

impl TaxonomyTable
{
    /// Compile every rule; a bad pattern is a configuration error
    pub fn compile(rules: &[TaxonomyRule]) -> Result<Self>
    {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules
        {
            let re = Regex::new(&format!("(?i){}", rule.pattern))
                .with_context(|| format!("Invalid taxonomy pattern: {}", rule.pattern))?;
            compiled.push((re, rule.field, rule.tags.clone()));
        }
        Ok(Self { rules: compiled })
    }

    /// Tags for a document, in rule order, deduplicated
    pub fn tags_for(
        &self,
        domain: &str,
        content: &str,
    ) -> Vec<String>
    {
        let mut out: Vec<String> = Vec::new();
        for (re, field, tags) in &self.rules
        {
            let haystack = match field
            {
                RuleField::Domain => domain,
                RuleField::Content => content,
            };
            if haystack.is_empty() || !re.is_match(haystack)
            {
                continue;
            }
            for t in tags
            {
                if !out.contains(t)
                {
                    out.push(t.clone());
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize
    {
        self.rules
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.rules
            .is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_rules_compile()
    {
        let table = TaxonomyTable::compile(&default_rules()).unwrap();
        assert_eq!(table.len(), default_rules().len());
    }

    #[test]
    fn domain_rules_match_hosts()
    {
        let table = TaxonomyTable::compile(&default_rules()).unwrap();
        assert_eq!(table.tags_for("github.com", ""), vec!["code", "software"]);
        assert_eq!(table.tags_for("www.youtube.com", ""), vec!["video"]);
        assert!(
            table
                .tags_for("example.org", "")
                .is_empty()
        );
    }

    #[test]
    fn content_rules_match_text()
    {
        let table = TaxonomyTable::compile(&default_rules()).unwrap();
        assert_eq!(table.tags_for("example.org", "Best Banana Bread Recipe"), vec!["cooking"]);
    }

    #[test]
    fn bad_pattern_is_rejected()
    {
        let rules = vec![TaxonomyRule { pattern: "(".into(), field: RuleField::Domain, tags: vec![] }];
        assert!(TaxonomyTable::compile(&rules).is_err());
    }
}
