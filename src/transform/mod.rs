// src/transform/mod.rs
//! Rewrites a source article into an English blog post draft.

pub mod slug;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::ingest::truncate_chars;
use crate::ingest::types::SourceArticle;
use crate::llm::{strip_code_fence, ChatClient};
use crate::locale::Locale;

pub use slug::{slugify, SlugRegistry};

pub const DEFAULT_AUTHOR: &str = "ai-editor";
/// Raw article text sent to the model is capped at this many chars.
const MAX_PROMPT_CHARS: usize = 6_000;
const MAX_KEYWORDS: usize = 5;

/// What a content model produces for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub keywords: Vec<String>,
}

/// English post ready for translation. `slug` is shared by every locale variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftPost {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub source_url: String,
    pub source_name: String,
    pub locale: Locale,
}

#[async_trait]
pub trait ContentModel: Send + Sync {
    async fn rewrite(&self, article: &SourceArticle) -> Result<Rewrite, TransformError>;
    fn name(&self) -> &str;
}

/// Offline rewrite: tags the title and trims the source text.
pub struct MockModel;

#[async_trait]
impl ContentModel for MockModel {
    async fn rewrite(&self, article: &SourceArticle) -> Result<Rewrite, TransformError> {
        let summary_src = if article.summary.trim().is_empty() {
            &article.raw_text
        } else {
            &article.summary
        };
        Ok(Rewrite {
            title: format!("[Analysis] {}", article.title),
            summary: truncate_chars(summary_src.trim(), 200),
            content: truncate_chars(article.raw_text.trim(), 2_000),
            keywords: vec!["AI".to_string(), "Technology".to_string()],
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

const SYSTEM_PROMPT: &str =
    "You are a professional AI technology analyst. Always respond with valid JSON.";

/// Prompt asking for a JSON object with title, summary, content and keywords.
pub fn build_prompt(article: &SourceArticle) -> String {
    format!(
        r#"You are an expert AI technology analyst writing for a professional tech blog.

Transform the following raw article content into a professional, in-depth analysis article.

## Requirements:
1. **Title**: Create a compelling, professional title (not clickbait)
2. **Summary**: Write a concise 2-3 sentence summary highlighting the key insights
3. **Content**: Rewrite as a professional analysis article with:
   - Clear introduction explaining the context and significance
   - Detailed analysis of the technology/topic
   - Implications for the industry and future developments
   - Professional tone suitable for tech professionals
   - Well-structured paragraphs with logical flow
   - Target length: 1000-2000 words
4. **Keywords**: Extract 3-5 relevant keywords/tags

## Raw Article:
Title: {title}
Source: {source}
Content:
{content}

## Output Format (JSON):
{{
    "title": "Your professional title here",
    "summary": "Your 2-3 sentence summary here",
    "content": "Your full article content here (use markdown format)",
    "keywords": ["keyword1", "keyword2", "keyword3"]
}}
"#,
        title = article.title,
        source = article.source_name,
        content = truncate_chars(&article.raw_text, MAX_PROMPT_CHARS),
    )
}

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)"title"\s*:\s*"([^"]*)""#).unwrap());
static RE_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"summary"\s*:\s*"([^"]*)""#).unwrap());
static RE_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"content"\s*:\s*"(.+?)"\s*,\s*"keywords""#).unwrap());
static RE_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"keywords"\s*:\s*\[(.*?)\]"#).unwrap());

fn unescape_json_fragment(s: &str) -> String {
    s.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

/// Parse a model reply. Strict JSON first; models often emit almost-JSON
/// (unescaped newlines in `content`), so fall back to per-field extraction.
pub fn parse_reply(reply: &str, article: &SourceArticle) -> Result<Rewrite, TransformError> {
    #[derive(Deserialize)]
    struct Reply {
        #[serde(default)]
        title: String,
        #[serde(default)]
        summary: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        keywords: Vec<String>,
    }

    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(TransformError::MalformedResponse("empty reply".to_string()));
    }
    let body = match serde_json::from_str::<Reply>(trimmed) {
        Ok(_) => trimmed,
        Err(_) => strip_code_fence(trimmed),
    };

    let parsed = match serde_json::from_str::<Reply>(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "model reply is not strict JSON, extracting fields");
            let capture = |re: &Regex| {
                re.captures(body)
                    .and_then(|c| c.get(1))
                    .map(|m| unescape_json_fragment(m.as_str()))
            };
            Reply {
                title: capture(&RE_TITLE).unwrap_or_default(),
                summary: capture(&RE_SUMMARY).unwrap_or_default(),
                content: capture(&RE_CONTENT).unwrap_or_else(|| body.to_string()),
                keywords: capture(&RE_KEYWORDS)
                    .map(|list| list.split(',').map(|k| k.replace('"', "")).collect())
                    .unwrap_or_default(),
            }
        }
    };

    let content = parsed.content.trim().to_string();
    if content.is_empty() {
        return Err(TransformError::MalformedResponse(
            "reply has no article content".to_string(),
        ));
    }
    let title = match parsed.title.trim() {
        "" => article.title.clone(),
        t => t.to_string(),
    };
    let summary = match parsed.summary.trim() {
        "" => truncate_chars(article.summary.trim(), 200),
        s => s.to_string(),
    };
    let mut keywords = clean_keywords(parsed.keywords);
    if keywords.is_empty() {
        keywords.push("AI".to_string());
    }

    Ok(Rewrite {
        title,
        summary,
        content,
        keywords,
    })
}

fn clean_keywords(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for k in raw {
        let k = k.trim().to_string();
        if !k.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(&k)) {
            out.push(k);
        }
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    out
}

/// Chat-model backed rewriter.
pub struct ChatModel {
    client: ChatClient,
}

impl ChatModel {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentModel for ChatModel {
    async fn rewrite(&self, article: &SourceArticle) -> Result<Rewrite, TransformError> {
        let reply = self
            .client
            .complete(SYSTEM_PROMPT, &build_prompt(article))
            .await
            .map_err(|e| TransformError::Backend(e.to_string()))?;
        parse_reply(&reply, article)
    }

    fn name(&self) -> &str {
        self.client.provider_name()
    }
}

pub struct Transformer {
    model: Box<dyn ContentModel>,
    min_source_chars: usize,
}

impl Transformer {
    pub fn new(model: Box<dyn ContentModel>, min_source_chars: usize) -> Self {
        Self {
            model,
            min_source_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Produce a draft with a slug that is unique within `slugs`.
    pub async fn transform(
        &self,
        article: &SourceArticle,
        slugs: &mut SlugRegistry,
    ) -> Result<DraftPost, TransformError> {
        let text = article.raw_text.trim();
        if text.is_empty() {
            return Err(TransformError::EmptyContent {
                id: article.id.clone(),
            });
        }
        let chars = text.chars().count();
        if chars < self.min_source_chars {
            return Err(TransformError::TooShort {
                id: article.id.clone(),
                chars,
                min: self.min_source_chars,
            });
        }

        let rewrite = self.model.rewrite(article).await?;
        if rewrite.content.trim().is_empty() {
            return Err(TransformError::MalformedResponse(
                "rewrite has no content".to_string(),
            ));
        }

        let mut base = slugify(&rewrite.title);
        if base.is_empty() {
            base = format!("post-{}", article.id.chars().take(8).collect::<String>());
        }
        let slug = slugs.allocate(&base, &article.url);

        Ok(DraftPost {
            slug,
            title: rewrite.title.trim().to_string(),
            description: rewrite.summary.trim().to_string(),
            body: rewrite.content.trim().to_string(),
            tags: rewrite.keywords,
            authors: vec![DEFAULT_AUTHOR.to_string()],
            source_url: article.url.clone(),
            source_name: article.source_name.clone(),
            locale: Locale::En,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(text: &str) -> SourceArticle {
        SourceArticle::new("https://src.test/a", "Original Title", text).with_source("Src")
    }

    #[test]
    fn code_blocks_inside_content_survive() {
        let reply = r#"{"title": "Real Title", "summary": "S.", "content": "Intro.\n\n```python\nprint(1)\n```\n\nOutro.", "keywords": ["Python"]}"#;
        let r = parse_reply(reply, &article("x")).unwrap();
        assert_eq!(r.title, "Real Title");
        assert_eq!(r.content, "Intro.\n\n```python\nprint(1)\n```\n\nOutro.");
        assert_eq!(r.keywords, vec!["Python".to_string()]);

        let fenced = format!("```json\n{reply}\n```");
        let r = parse_reply(&fenced, &article("x")).unwrap();
        assert_eq!(r.title, "Real Title");
        assert!(r.content.ends_with("Outro."));
    }

    #[test]
    fn parses_fenced_json_reply() {
        let reply = "```json\n{\"title\": \"New Title\", \"summary\": \"S.\", \"content\": \"Body\", \"keywords\": [\"LLM\", \" llm \", \"Agents\"]}\n```";
        let r = parse_reply(reply, &article("x")).unwrap();
        assert_eq!(r.title, "New Title");
        assert_eq!(r.content, "Body");
        assert_eq!(r.keywords, vec!["LLM".to_string(), "Agents".to_string()]);
    }

    #[test]
    fn falls_back_to_field_extraction() {
        let reply = "{\"title\": \"T\", \"summary\": \"S\", \"content\": \"line one\nline two\", \"keywords\": [\"a\", \"b\"]}";
        let r = parse_reply(reply, &article("x")).unwrap();
        assert_eq!(r.title, "T");
        assert_eq!(r.content, "line one\nline two");
        assert_eq!(r.keywords, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_fields_fall_back_to_source() {
        let r = parse_reply("{\"content\": \"Only body\"}", &article("x")).unwrap();
        assert_eq!(r.title, "Original Title");
        assert_eq!(r.keywords, vec!["AI".to_string()]);
        assert!(parse_reply("   ", &article("x")).is_err());
    }

    #[tokio::test]
    async fn empty_and_short_sources_are_rejected() {
        let t = Transformer::new(Box::new(MockModel), 20);
        let mut slugs = SlugRegistry::new();

        let err = t.transform(&article("   "), &mut slugs).await.unwrap_err();
        assert!(matches!(err, TransformError::EmptyContent { .. }));

        let err = t.transform(&article("too short"), &mut slugs).await.unwrap_err();
        assert!(matches!(err, TransformError::TooShort { chars: 9, .. }));
        assert!(slugs.is_empty());
    }

    #[tokio::test]
    async fn mock_transform_fills_front_matter_fields() {
        let t = Transformer::new(Box::new(MockModel), 20);
        let mut slugs = SlugRegistry::new();
        let draft = t
            .transform(&article(&"Long enough body text. ".repeat(3)), &mut slugs)
            .await
            .unwrap();
        assert_eq!(draft.slug, "analysis-original-title");
        assert_eq!(draft.title, "[Analysis] Original Title");
        assert_eq!(draft.authors, vec![DEFAULT_AUTHOR.to_string()]);
        assert_eq!(draft.tags, vec!["AI".to_string(), "Technology".to_string()]);
        assert_eq!(draft.source_url, "https://src.test/a");
        assert_eq!(draft.source_name, "Src");
        assert_eq!(draft.locale, Locale::En);
    }
}
