// src/ingest/relevance.rs
//! Keyword relevance gate for listed articles: blockers first, then weighted
//! keyword hits against a threshold. A quality score (source priority, title
//! and summary length, recency) orders equally-dated articles.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::ingest::types::SourceArticle;

pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 10.0;
const MAX_SCORE: f32 = 100.0;
const RECENT_SECS: u64 = 365 * 24 * 60 * 60;

fn default_threshold() -> f32 {
    DEFAULT_RELEVANCE_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Weights {
    #[serde(default = "Weights::high")]
    pub high: f32,
    #[serde(default = "Weights::medium")]
    pub medium: f32,
    #[serde(default = "Weights::low")]
    pub low: f32,
}

impl Weights {
    fn high() -> f32 {
        15.0
    }
    fn medium() -> f32 {
        8.0
    }
    fn low() -> f32 {
        3.0
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            high: Self::high(),
            medium: Self::medium(),
            low: Self::low(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Keywords {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

/// Filter settings; every field may be omitted in the TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelevanceConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default = "RelevanceConfig::builtin_keywords")]
    pub keywords: Keywords,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl RelevanceConfig {
    /// Productivity-oriented AI keywords; academic topics are blocked.
    pub fn builtin() -> Self {
        Self {
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
            exclude: strings(&[
                "arXiv",
                "paper",
                "research",
                "algorithm",
                "model architecture",
                "neural network",
                "training",
                "benchmark",
                "dataset",
                "quantum",
                "protein",
                "molecular",
                "physics",
                "biology",
            ]),
            weights: Weights::default(),
            keywords: Self::builtin_keywords(),
        }
    }

    fn builtin_keywords() -> Keywords {
        Keywords {
            high: strings(&[
                "ChatGPT",
                "Claude",
                "Gemini",
                "Midjourney",
                "Notion AI",
                "automation",
                "workflow",
                "productivity",
                "efficiency",
                "save time",
                "template",
                "tutorial",
                "how to",
                "guide",
                "feature",
                "update",
                "new release",
                "integration",
                "API",
            ]),
            medium: strings(&[
                "content creation",
                "writing",
                "marketing",
                "design",
                "customer service",
                "data analysis",
                "coding",
                "SEO",
                "AI tool",
                "AI assistant",
                "chatbot",
                "generator",
            ]),
            low: strings(&["AI", "ML", "tool", "tips"]),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let err = |reason: String| ConfigError::Relevance {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let cfg = Self::from_toml_str(&content).map_err(|e| err(e.to_string()))?;
        if !cfg.threshold.is_finite() || cfg.threshold < 0.0 {
            return Err(err(format!("threshold must be >= 0, got {}", cfg.threshold)));
        }
        Ok(cfg)
    }
}

/// Outcome for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct Relevance {
    /// Keyword score, 0..=100.
    pub score: f32,
    /// Quality score, 0..=100.
    pub quality: f32,
    pub matched: Vec<String>,
    pub reasons: Vec<String>,
    pub passed: bool,
}

impl Relevance {
    /// `0.6 * score + 0.4 * quality`.
    pub fn combined(&self) -> f32 {
        self.score * 0.6 + self.quality * 0.4
    }
}

struct CompiledKeyword {
    word: String,
    re: Regex,
    weight: f32,
}

fn keyword_regex(word: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word.trim())))
}

fn compile(words: &[String], weight: f32) -> Result<Vec<CompiledKeyword>, regex::Error> {
    words
        .iter()
        .filter(|w| !w.trim().is_empty())
        .map(|w| {
            Ok(CompiledKeyword {
                word: w.trim().to_string(),
                re: keyword_regex(w)?,
                weight,
            })
        })
        .collect()
}

pub struct RelevanceFilter {
    threshold: f32,
    blockers: Vec<CompiledKeyword>,
    keywords: Vec<CompiledKeyword>,
}

impl RelevanceFilter {
    pub fn new(cfg: &RelevanceConfig) -> Result<Self, regex::Error> {
        let mut keywords = compile(&cfg.keywords.high, cfg.weights.high)?;
        keywords.extend(compile(&cfg.keywords.medium, cfg.weights.medium)?);
        keywords.extend(compile(&cfg.keywords.low, cfg.weights.low)?);
        // A word listed in two tiers counts once, at its first tier.
        let mut seen = std::collections::HashSet::new();
        keywords.retain(|k| seen.insert(k.word.to_ascii_lowercase()));

        Ok(Self {
            threshold: cfg.threshold,
            blockers: compile(&cfg.exclude, 0.0)?,
            keywords,
        })
    }

    /// Score title + summary (or the start of the body when there is no summary).
    /// `now` is unix seconds, used for the recency bonus.
    pub fn evaluate(&self, article: &SourceArticle, now: u64) -> Relevance {
        let summary = if article.summary.trim().is_empty() {
            crate::ingest::truncate_chars(&article.raw_text, 500)
        } else {
            article.summary.clone()
        };
        let text = format!("{} {}", article.title, summary);
        let quality = quality_score(article, &summary, now);

        let blocked: Vec<String> = self
            .blockers
            .iter()
            .filter(|b| b.re.is_match(&text))
            .map(|b| format!("blocker:{}", b.word))
            .collect();
        if !blocked.is_empty() {
            return Relevance {
                score: 0.0,
                quality,
                matched: Vec::new(),
                reasons: blocked,
                passed: false,
            };
        }

        let mut score = 0.0f32;
        let mut matched = Vec::new();
        for k in &self.keywords {
            if k.re.is_match(&text) {
                score += k.weight;
                matched.push(k.word.clone());
            }
        }
        let score = score.min(MAX_SCORE);
        let passed = score >= self.threshold;
        let reasons = vec![format!(
            "{}:{:.1}",
            if passed { "threshold_ok" } else { "threshold_fail" },
            self.threshold
        )];
        Relevance {
            score,
            quality,
            matched,
            reasons,
            passed,
        }
    }
}

fn quality_score(article: &SourceArticle, summary: &str, now: u64) -> f32 {
    // Priority 1 feeds start highest.
    let mut score = match article.priority {
        0 | 1 => 50.0,
        2 => 40.0,
        _ => 30.0,
    };
    let title_len = article.title.chars().count();
    if (30..=100).contains(&title_len) {
        score += 10.0;
    } else if title_len < 20 {
        score -= 5.0;
    }
    if summary.chars().count() >= 200 {
        score += 10.0;
    }
    if article.published_at > 0 && now.saturating_sub(article.published_at) <= RECENT_SECS {
        score += 15.0;
    }
    f32::clamp(score, 0.0, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_750_000_000;

    fn article(title: &str, summary: &str) -> SourceArticle {
        let mut a = SourceArticle::new("https://src.test/a", title, "body").with_published_at(NOW - 60);
        a.summary = summary.to_string();
        a
    }

    #[test]
    fn blockers_win_over_keywords() {
        let f = RelevanceFilter::new(&RelevanceConfig::builtin()).unwrap();
        let r = f.evaluate(&article("ChatGPT workflow tutorial", "New research paper on arXiv"), NOW);
        assert!(!r.passed);
        assert_eq!(r.score, 0.0);
        assert!(r.reasons.iter().any(|x| x == "blocker:research"));
    }

    #[test]
    fn weighted_hits_are_summed_and_capped() {
        let f = RelevanceFilter::new(&RelevanceConfig::builtin()).unwrap();
        let r = f.evaluate(
            &article("How to automate your workflow with ChatGPT", "A guide with tips."),
            NOW,
        );
        assert!(r.passed);
        // how to, workflow, ChatGPT, guide = 4 * 15; tips = 3
        assert_eq!(r.score, 63.0);
        assert!(r.matched.contains(&"tips".to_string()));

        let many = "ChatGPT Claude Gemini Midjourney automation workflow productivity efficiency";
        assert_eq!(f.evaluate(&article(many, ""), NOW).score, 100.0);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let f = RelevanceFilter::new(&RelevanceConfig::builtin()).unwrap();
        // "said" and "main" contain "ai" but are not the keyword.
        let r = f.evaluate(&article("She said the main road", ""), NOW);
        assert_eq!(r.score, 0.0);
        assert!(!r.passed);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RelevanceConfig::from_toml_str(
            r#"
threshold = 20.0
exclude = ["crypto"]

[weights]
high = 25.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.threshold, 20.0);
        assert_eq!(cfg.exclude, vec!["crypto".to_string()]);
        assert_eq!(cfg.weights.high, 25.0);
        assert_eq!(cfg.weights.low, 3.0);
        assert!(cfg.keywords.high.iter().any(|k| k == "ChatGPT"));

        let f = RelevanceFilter::new(&cfg).unwrap();
        assert_eq!(f.evaluate(&article("ChatGPT update", ""), NOW).score, 50.0);
        assert!(!f.evaluate(&article("ChatGPT and crypto", ""), NOW).passed);
    }

    #[test]
    fn quality_rewards_fresh_well_described_items() {
        let f = RelevanceFilter::new(&RelevanceConfig::builtin()).unwrap();
        let fresh = f.evaluate(&article("A title that is comfortably long enough", &"s".repeat(250)), NOW);
        assert_eq!(fresh.quality, 85.0);

        let mut stale = article("Short", "");
        stale.published_at = 0;
        stale.priority = 3;
        assert_eq!(f.evaluate(&stale, NOW).quality, 25.0);
    }
}
