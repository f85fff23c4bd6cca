//! Tokenization rules shared by every feature family.
//!
//! Lowercase, replace characters outside the alphabet allow-list with
//! whitespace, split, drop short tokens and stopwords, then strip a light
//! suffix ("ing" / "ed" / "s") when the stem stays long enough.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Additional scripts admitted by the alphabet allow-list.
///
/// ASCII letters and digits are always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script
{
    /// Latin-1 supplement and Latin Extended-A letters (é, ü, ł, ...)
    LatinExtended,
    /// Greek and Coptic block
    Greek,
    /// Basic Cyrillic block
    Cyrillic,
}

impl Script
{
    /// Whether `c` (already lowercased) belongs to this script
    fn admits(
        self,
        c: char,
    ) -> bool
    {
        match self
        {
            Script::LatinExtended =>
            {
                matches!(c, '\u{00DF}'..='\u{00F6}' | '\u{00F8}'..='\u{00FF}' | '\u{0100}'..='\u{017F}')
            }
            Script::Greek => matches!(c, '\u{0370}'..='\u{03FF}'),
            Script::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}'),
        }
    }
}

/// Deterministic word tokenizer
#[derive(Debug, Clone)]
pub struct Tokenizer
{
    /// Tokens shorter than this (in chars) are dropped
    min_len: usize,
    /// Suffix stripping only applies when the stem keeps this many chars
    min_stem_len: usize,
    /// Extra scripts beyond ASCII alphanumerics
    scripts: Vec<Script>,
}

impl Default for Tokenizer
{
    fn default() -> Self
    {
        Self::new(3, 4, vec![Script::LatinExtended, Script::Greek])
    }
}

impl Tokenizer
{
    pub fn new(
        min_len: usize,
        min_stem_len: usize,
        scripts: Vec<Script>,
    ) -> Self
    {
        Self { min_len: min_len.max(1), min_stem_len, scripts }
    }

    /// Tokenize `text` into an ordered token stream (duplicates kept)
    pub fn tokens(
        &self,
        text: &str,
    ) -> Vec<String>
    {
        // Normalize: lowercase and blank out disallowed characters
        let cleaned: String = text
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| if self.allowed(c) { c } else { ' ' })
            .collect();

        cleaned
            .split_whitespace()
            .filter_map(|raw| self.normalize_word(raw))
            .collect()
    }

    /// Tokenize into a deduplicated, sorted set
    pub fn token_set(
        &self,
        text: &str,
    ) -> BTreeSet<String>
    {
        self.tokens(text)
            .into_iter()
            .collect()
    }

    /// Tokenize several fragments into one set
    pub fn token_set_of<S: AsRef<str>>(
        &self,
        parts: impl IntoIterator<Item = S>,
    ) -> BTreeSet<String>
    {
        let mut out = BTreeSet::new();
        for p in parts
        {
            out.extend(self.tokens(p.as_ref()));
        }
        out
    }

    fn allowed(
        &self,
        c: char,
    ) -> bool
    {
        c.is_ascii_alphanumeric()
            || self
                .scripts
                .iter()
                .any(|s| s.admits(c))
    }

    fn normalize_word(
        &self,
        raw: &str,
    ) -> Option<String>
    {
        if raw
            .chars()
            .count()
            < self.min_len
            || is_stopword(raw)
        {
            return None;
        }

        let stemmed = self.stem(raw);
        if is_stopword(stemmed)
        {
            return None;
        }

        Some(stemmed.to_string())
    }

    /// Strip one trailing suffix when the remainder stays long enough
    fn stem<'a>(
        &self,
        word: &'a str,
    ) -> &'a str
    {
        let len = word
            .chars()
            .count();

        // Suffixes are ASCII, so byte slicing stays on char boundaries
        for suffix in ["ing", "ed", "s"]
        {
            if word.ends_with(suffix) && len - suffix.len() >= self.min_stem_len
            {
                // "ss" endings ("class", "access") are not plurals
                if suffix == "s" && word.ends_with("ss")
                {
                    return word;
                }
                return &word[..word.len() - suffix.len()];
            }
        }

        word
    }
}

/// Common function words that never carry topical signal
pub fn is_stopword(word: &str) -> bool
{
    matches!(
        word,
        "the"
            | "and"
            | "for"
            | "are"
            | "but"
            | "not"
            | "you"
            | "your"
            | "all"
            | "can"
            | "had"
            | "her"
            | "his"
            | "was"
            | "one"
            | "our"
            | "out"
            | "has"
            | "have"
            | "been"
            | "from"
            | "this"
            | "that"
            | "with"
            | "they"
            | "will"
            | "each"
            | "which"
            | "their"
            | "said"
            | "what"
            | "its"
            | "into"
            | "more"
            | "other"
            | "about"
            | "how"
            | "why"
            | "when"
            | "where"
            | "who"
            | "also"
            | "than"
            | "then"
            | "them"
            | "there"
            | "these"
            | "those"
            | "would"
            | "could"
            | "should"
            | "just"
            | "over"
            | "some"
            | "such"
            | "only"
            | "any"
            | "most"
            | "very"
            | "http"
            | "https"
            | "www"
            | "html"
            | "htm"
            | "php"
    )
}

/// Domain-agnostic filler words that must never drive a merge decision.
///
/// Matched against stemmed tokens.
pub fn is_generic_merge_word(token: &str) -> bool
{
    matches!(
        token,
        "news"
            | "blog"
            | "overview"
            | "home"
            | "homepage"
            | "page"
            | "official"
            | "site"
            | "website"
            | "latest"
            | "welcome"
            | "index"
            | "update"
            | "article"
            | "post"
            | "online"
            | "free"
            | "best"
            | "top"
            | "new"
    )
}
