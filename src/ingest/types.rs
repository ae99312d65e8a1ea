// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

fn default_category() -> String {
    "AI".to_string()
}
fn default_priority() -> u8 {
    1
}

/// A collected upstream article. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceArticle {
    /// Stable id derived from url + title; see [`article_id`].
    #[serde(default)]
    pub id: String,
    pub url: String,
    pub title: String,
    /// Plain text body (HTML already stripped).
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Unix seconds; 0 when the feed gave no usable date.
    #[serde(default)]
    pub published_at: u64,
}

impl SourceArticle {
    pub fn new(url: &str, title: &str, raw_text: &str) -> Self {
        Self {
            id: article_id(url, title),
            url: url.to_string(),
            title: title.to_string(),
            raw_text: raw_text.to_string(),
            summary: String::new(),
            source_name: String::new(),
            category: default_category(),
            priority: default_priority(),
            published_at: 0,
        }
    }

    pub fn with_source(mut self, name: &str) -> Self {
        self.source_name = name.to_string();
        self
    }

    pub fn with_published_at(mut self, ts: u64) -> Self {
        self.published_at = ts;
        self
    }
}

/// Hex SHA-256 prefix of `"{url}:{title}"`.
pub fn article_id(url: &str, title: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b":");
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<SourceArticle>, RetrievalError>;
    fn name(&self) -> &str;
    /// Lower is listed first.
    fn priority(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_and_depends_on_both_parts() {
        let a = article_id("https://x.test/a", "Title");
        assert_eq!(a, article_id("https://x.test/a", "Title"));
        assert_eq!(a.len(), 32);
        assert_ne!(a, article_id("https://x.test/a", "Other"));
        assert_ne!(a, article_id("https://x.test/b", "Title"));
    }
}
