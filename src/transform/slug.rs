// src/transform/slug.rs
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_SLUG_LEN: usize = 50;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// URL-safe slug: lowercase ASCII letters, digits and single hyphens, at most 50 chars.
/// May be empty for titles with no ASCII alphanumerics.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let kept: String = lower
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    let hyphenated = RE_WS.replace_all(kept.trim(), "-");
    let collapsed = RE_DASHES.replace_all(&hyphenated, "-");
    let capped: String = collapsed.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    capped.trim_end_matches('-').to_string()
}

/// Slugs already in use, and which source article owns each.
///
/// Seeded from the published tree, then updated as the run allocates new slugs.
#[derive(Debug, Default, Clone)]
pub struct SlugRegistry {
    owners: HashMap<String, String>,
    by_source: HashMap<String, String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing slug. The first slug seen for a source URL is its canonical one.
    pub fn insert(&mut self, slug: impl Into<String>, source_url: impl Into<String>) {
        let slug = slug.into();
        let source_url = source_url.into();
        if !source_url.is_empty() {
            self.by_source
                .entry(source_url.clone())
                .or_insert_with(|| slug.clone());
        }
        self.owners.entry(slug).or_insert(source_url);
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.owners.contains_key(slug)
    }

    pub fn slug_for_source(&self, source_url: &str) -> Option<&str> {
        self.by_source.get(source_url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Pick the slug for a post derived from `source_url`.
    ///
    /// A source that already owns a slug keeps it, so re-runs land on the same
    /// files. Otherwise `base` is used if free, else the first free of
    /// `base-2`, `base-3`, ...
    pub fn allocate(&mut self, base: &str, source_url: &str) -> String {
        if let Some(existing) = self.slug_for_source(source_url) {
            return existing.to_string();
        }
        let mut candidate = base.to_string();
        let mut n = 2u32;
        while self.contains(&candidate) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        self.insert(candidate.clone(), source_url);
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("GPT-5: What's New?"), "gpt-5-whats-new");
        assert_eq!(slugify("  Multiple   spaces -- and dashes "), "multiple-spaces-and-dashes");
        assert_eq!(slugify("日本語のタイトル"), "");
    }

    #[test]
    fn slugify_caps_length_without_trailing_dash() {
        let title = "word ".repeat(30);
        let s = slugify(&title);
        assert!(s.len() <= MAX_SLUG_LEN);
        assert!(!s.ends_with('-'));
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mut reg = SlugRegistry::new();
        reg.insert("ai-news", "https://a.test/1");
        assert_eq!(reg.allocate("ai-news", "https://b.test/2"), "ai-news-2");
        assert_eq!(reg.allocate("ai-news", "https://c.test/3"), "ai-news-3");
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn known_source_reuses_its_slug() {
        let mut reg = SlugRegistry::new();
        reg.insert("ai-news", "https://a.test/1");
        assert_eq!(reg.allocate("different-title", "https://a.test/1"), "ai-news");
        assert_eq!(reg.len(), 1);
    }
}
