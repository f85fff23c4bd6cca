//! Input documents and the optional semantic features attached to them.

use serde::{Deserialize, Serialize};
use url::Url;

/// Semantic features supplied by a topic oracle (or the deterministic fallback)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticFeatures
{
    pub primary_topic: String,
    pub subtopics: Vec<String>,
    pub entities: Vec<String>,
    /// "article", "docs", "category", "landing", ...
    pub doc_type: String,
    pub is_generic_landing: bool,
    pub merge_hints: Vec<String>,
    pub summary_bullets: Vec<String>,
}

/// One input item (a browser tab, generically)
///
/// Every field is optional on the wire; a document with nothing in it is
/// still valid and simply carries no signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document
{
    /// Stable caller-side index; defaults to the corpus position
    pub index: Option<usize>,
    pub title: String,
    pub url: String,
    /// Host name; derived from `url` when empty
    pub domain: String,
    pub language: String,
    /// Free text scraped from the page
    pub content: String,
    /// Meta description
    pub description: String,
    pub headings: Vec<String>,
    pub meta_keywords: Vec<String>,
    pub summary_bullets: Vec<String>,
    /// Platform identity (channel, author account, ...)
    pub origin_key: Option<String>,
    pub semantic: Option<SemanticFeatures>,
    pub embedding: Option<Vec<f32>>,
}

impl Document
{
    /// Minimal constructor used by tests and callers building corpora in code
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self
    {
        Self { title: title.into(), url: url.into(), ..Default::default() }
    }

    pub fn with_content(
        mut self,
        content: impl Into<String>,
    ) -> Self
    {
        self.content = content.into();
        self
    }

    pub fn with_language(
        mut self,
        language: impl Into<String>,
    ) -> Self
    {
        self.language = language.into();
        self
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Self
    {
        self.description = description.into();
        self
    }

    pub fn with_semantic(
        mut self,
        semantic: SemanticFeatures,
    ) -> Self
    {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_origin(
        mut self,
        origin_key: impl Into<String>,
    ) -> Self
    {
        self.origin_key = Some(origin_key.into());
        self
    }

    fn parsed_url(&self) -> Option<Url>
    {
        let raw = self
            .url
            .trim();
        if raw.is_empty()
        {
            return None;
        }
        Url::parse(raw).ok()
    }

    /// Normalized host: explicit domain wins, else URL host, minus "www."
    pub fn host(&self) -> String
    {
        let raw = if self
            .domain
            .trim()
            .is_empty()
        {
            self.parsed_url()
                .and_then(|u| {
                    u.host_str()
                        .map(str::to_string)
                })
                .unwrap_or_default()
        }
        else
        {
            self.domain
                .trim()
                .to_string()
        };

        let lower = raw.to_lowercase();
        lower
            .strip_prefix("www.")
            .map(str::to_string)
            .unwrap_or(lower)
    }

    /// Non-empty URL path segments (percent-decoding is left to the tokenizer)
    pub fn path_segments(&self) -> Option<Vec<String>>
    {
        let url = self.parsed_url()?;
        let segments: Vec<String> = url
            .path_segments()
            .map(|segs| {
                segs.filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(segments)
    }

    /// Platform identity: the explicit key, else a channel-style URL path
    ///
    /// `youtube.com/@name/videos` and `youtube.com/channel/<id>` both map to
    /// `host/segment`.
    pub fn origin(&self) -> Option<String>
    {
        if let Some(key) = self
            .origin_key
            .as_ref()
            .map(|k| {
                k.trim()
                    .to_lowercase()
            })
            && !key.is_empty()
        {
            return Some(key);
        }

        let segments = self.path_segments()?;
        let host = self.host();
        let first = segments.first()?;

        if let Some(handle) = first.strip_prefix('@')
            && !handle.is_empty()
        {
            return Some(format!("{}/@{}", host, handle.to_lowercase()));
        }

        if matches!(first.as_str(), "channel" | "c" | "user")
            && let Some(id) = segments.get(1)
        {
            return Some(format!("{}/{}", host, id.to_lowercase()));
        }

        None
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn host_prefers_explicit_domain()
    {
        let mut d = Document::new("t", "https://www.example.com/a");
        assert_eq!(d.host(), "example.com");

        d.domain = "Docs.RS".into();
        assert_eq!(d.host(), "docs.rs");
    }

    #[test]
    fn host_of_garbage_url_is_empty()
    {
        let d = Document::new("t", "not a url");
        assert_eq!(d.host(), "");
        assert!(
            d.path_segments()
                .is_none()
        );
    }

    #[test]
    fn origin_from_channel_paths()
    {
        let a = Document::new("", "https://www.youtube.com/@RustConf/videos");
        assert_eq!(
            a.origin()
                .as_deref(),
            Some("youtube.com/@rustconf")
        );

        let b = Document::new("", "https://youtube.com/channel/UC123");
        assert_eq!(
            b.origin()
                .as_deref(),
            Some("youtube.com/uc123")
        );

        let c = Document::new("", "https://example.com/blog/post");
        assert!(
            c.origin()
                .is_none()
        );
    }

    #[test]
    fn explicit_origin_wins()
    {
        let d = Document::new("", "https://example.com/").with_origin("  Feed:42 ");
        assert_eq!(
            d.origin()
                .as_deref(),
            Some("feed:42")
        );
    }
}
