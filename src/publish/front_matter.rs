// src/publish/front_matter.rs
//! YAML front-matter + markdown body, the format the site generator reads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::ingest::truncate_chars;
use crate::translate::LocalizedPost;

pub const TRUNCATE_MARKER: &str = "<!-- truncate -->";
const DESCRIPTION_MAX_CHARS: usize = 160;
const DELIMITER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl FrontMatter {
    pub fn for_post(post: &LocalizedPost, date: NaiveDate) -> Self {
        let description = post.description.trim();
        Self {
            slug: post.slug.clone(),
            title: post.title.trim().to_string(),
            authors: post.authors.clone(),
            tags: post.tags.clone(),
            description: (!description.is_empty())
                .then(|| truncate_chars(description, DESCRIPTION_MAX_CHARS)),
            source_url: post.source_url.clone(),
            source_name: post.source_name.clone(),
            date: Some(date.format("%Y-%m-%d").to_string()),
        }
    }
}

/// A published file read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPost {
    pub front: FrontMatter,
    /// Text between the front-matter and the truncate marker.
    pub excerpt: String,
    /// Text after the truncate marker (everything, if there is no marker).
    pub body: String,
}

/// Serialize a post: front-matter, excerpt, truncate marker, body.
pub fn render(post: &LocalizedPost, date: NaiveDate) -> Result<String, PublishError> {
    let front = FrontMatter::for_post(post, date);
    let yaml = serde_yaml_ng::to_string(&front).map_err(|e| PublishError::FrontMatter {
        slug: post.slug.clone(),
        message: e.to_string(),
    })?;

    let mut out = String::with_capacity(yaml.len() + post.body.len() + post.description.len() + 64);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    let excerpt = post.description.trim();
    if !excerpt.is_empty() {
        out.push_str(excerpt);
        out.push_str("\n\n");
    }
    out.push_str(TRUNCATE_MARKER);
    out.push_str("\n\n");
    out.push_str(post.body.trim());
    out.push('\n');
    Ok(out)
}

/// Split a document into its YAML block and the remainder.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;
    if let Some(after) = rest.strip_prefix("---") {
        return Some(("", after));
    }
    let end = rest.find("\n---")?;
    let yaml = &rest[..end + 1];
    let after = &rest[end + 4..];
    let after = after.split_once('\n').map_or("", |(_, tail)| tail);
    Some((yaml, after))
}

pub fn parse(text: &str) -> Result<ParsedPost, PublishError> {
    let (yaml, rest) =
        split(text).ok_or_else(|| PublishError::Parse("missing front-matter block".to_string()))?;
    let front: FrontMatter =
        serde_yaml_ng::from_str(yaml).map_err(|e| PublishError::Parse(e.to_string()))?;
    let (excerpt, body) = match rest.split_once(TRUNCATE_MARKER) {
        Some((head, tail)) => (head.trim().to_string(), tail.trim().to_string()),
        None => (String::new(), rest.trim().to_string()),
    };
    Ok(ParsedPost {
        front,
        excerpt,
        body,
    })
}
