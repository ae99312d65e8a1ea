// src/config/sources.rs
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_category() -> String {
    "AI".to_string()
}
fn default_priority() -> u8 {
    1
}

/// One upstream RSS feed. Lower `priority` is listed first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, priority: u8) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: default_category(),
            priority,
        }
    }
}

/// Built-in feed list used when `SOURCES_PATH` is not set.
pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "MIT Technology Review AI",
            "https://www.technologyreview.com/feed/",
            1,
        ),
        FeedSource::new("AI Weekly", "https://aiweekly.co/feed", 1),
        FeedSource::new("The Gradient", "https://thegradient.pub/rss/", 2),
        FeedSource::new("OpenAI Blog", "https://openai.com/blog/rss.xml", 1),
        FeedSource::new("Google AI Blog", "https://blog.google/technology/ai/rss/", 1),
        FeedSource::new("DeepMind Blog", "https://deepmind.com/blog/rss.xml", 1),
        FeedSource::new(
            "VentureBeat AI",
            "https://venturebeat.com/category/artificial-intelligence/feed/",
            2,
        ),
        FeedSource::new("Synced AI", "https://syncedreview.com/feed/", 2),
    ]
}

/// Load a feed list from an explicit path. Supports TOML (`[[sources]]`) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let err = |reason: String| ConfigError::Sources {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let sources = parse_sources(&content, &ext).map_err(err)?;
    if sources.is_empty() {
        return Err(err("feed list is empty".to_string()));
    }
    Ok(sources)
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>, String> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err("unsupported feed list format".to_string())
}

fn parse_toml(s: &str) -> Result<Vec<FeedSource>, toml::de::Error> {
    #[derive(Deserialize)]
    struct TomlSources {
        sources: Vec<FeedSource>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<FeedSource>, serde_json::Error> {
    let v: Vec<FeedSource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim fields, drop entries without a URL, keep the first entry per URL.
fn clean_list(items: Vec<FeedSource>) -> Vec<FeedSource> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        it.url = it.url.trim().to_string();
        if it.url.is_empty() || !seen.insert(it.url.clone()) {
            continue;
        }
        if it.name.is_empty() {
            it.name = it.url.clone();
        }
        out.push(it);
    }
    out
}
