// src/translate/mod.rs
//! Per-locale variants of a draft. Locales are translated independently and
//! retried with exponential backoff; one failing locale never blocks another.

pub mod deepl;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::TranslationError;
use crate::llm::ChatClient;
use crate::locale::Locale;
use crate::transform::DraftPost;

pub use deepl::DeepLBackend;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// One locale variant of a post, owned by the publisher until written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedPost {
    pub slug: String,
    pub locale: Locale,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub source_url: String,
    pub source_name: String,
}

impl LocalizedPost {
    /// The English draft as-is.
    pub fn passthrough(draft: &DraftPost) -> Self {
        Self::with_text(
            draft,
            draft.locale,
            draft.title.clone(),
            draft.description.clone(),
            draft.body.clone(),
        )
    }

    fn with_text(
        draft: &DraftPost,
        locale: Locale,
        title: String,
        description: String,
        body: String,
    ) -> Self {
        Self {
            slug: draft.slug.clone(),
            locale,
            title,
            description,
            body,
            tags: draft.tags.clone(),
            authors: draft.authors.clone(),
            source_url: draft.source_url.clone(),
            source_name: draft.source_name.clone(),
        }
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, target: Locale) -> Result<String, TranslationError>;
    fn name(&self) -> &str;
}

/// Offline backend: marks the text instead of translating it.
pub struct MockBackend;

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, text: &str, target: Locale) -> Result<String, TranslationError> {
        Ok(match target {
            Locale::En => text.to_string(),
            Locale::Zh => format!("[中文翻译] {text}"),
            Locale::Ja => format!("[日本語翻訳] {text}"),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Translation through the configured chat model.
pub struct ChatBackend {
    client: ChatClient,
}

impl ChatBackend {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TranslationBackend for ChatBackend {
    async fn translate(&self, text: &str, target: Locale) -> Result<String, TranslationError> {
        if target.is_source() {
            return Ok(text.to_string());
        }
        let system = format!(
            "You are a professional technical translator. Translate the user's markdown from English into {}. \
             Preserve markdown formatting, links and code blocks. Output only the translation.",
            target.display_name()
        );
        match self.client.complete(&system, text).await {
            Ok(out) => Ok(out),
            Err(crate::llm::ChatError::Status { status, body }) => {
                Err(TranslationError::Status { status, body })
            }
            Err(crate::llm::ChatError::Empty) => Err(TranslationError::EmptyResponse),
            Err(e) => Err(TranslationError::Http(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        self.client.provider_name()
    }
}

/// Result for one locale of one draft.
#[derive(Debug)]
pub struct LocaleOutcome {
    pub locale: Locale,
    pub result: Result<LocalizedPost, TranslationError>,
    pub attempts: u32,
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// doubling at most 16 times and saturating at `Duration::MAX`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(1u32 << attempt.saturating_sub(1).min(16))
        .unwrap_or(Duration::MAX)
}

pub struct Translator {
    backend: Box<dyn TranslationBackend>,
    locales: Vec<Locale>,
    max_retries: u32,
    base_delay: Duration,
}

impl Translator {
    pub fn new(backend: Box<dyn TranslationBackend>, locales: Vec<Locale>) -> Self {
        Self {
            backend,
            locales,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn locales(&self) -> &[Locale] {
        &self.locales
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// One outcome per configured locale.
    pub async fn localize(&self, draft: &DraftPost) -> Vec<LocaleOutcome> {
        self.localize_only(draft, &self.locales).await
    }

    /// One outcome per locale in `locales`, in that order.
    pub async fn localize_only(&self, draft: &DraftPost, locales: &[Locale]) -> Vec<LocaleOutcome> {
        let mut out = Vec::with_capacity(locales.len());
        for &locale in locales {
            out.push(self.localize_one(draft, locale).await);
        }
        out
    }

    async fn localize_one(&self, draft: &DraftPost, locale: Locale) -> LocaleOutcome {
        if locale == draft.locale {
            return LocaleOutcome {
                locale,
                result: Ok(LocalizedPost::passthrough(draft)),
                attempts: 0,
            };
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.translate_post(draft, locale).await {
                Ok(post) => {
                    return LocaleOutcome {
                        locale,
                        result: Ok(post),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt <= self.max_retries => {
                    tracing::warn!(
                        slug = %draft.slug,
                        locale = %locale,
                        attempt,
                        error = %e,
                        "translation failed, retrying"
                    );
                    let delay = backoff_delay(self.base_delay, attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    return LocaleOutcome {
                        locale,
                        result: Err(e),
                        attempts: attempt,
                    }
                }
            }
        }
    }

    async fn translate_post(
        &self,
        draft: &DraftPost,
        locale: Locale,
    ) -> Result<LocalizedPost, TranslationError> {
        let title = self.backend.translate(&draft.title, locale).await?;
        let description = if draft.description.trim().is_empty() {
            String::new()
        } else {
            self.backend.translate(&draft.description, locale).await?
        };
        let body = self.backend.translate(&draft.body, locale).await?;
        Ok(LocalizedPost::with_text(
            draft,
            locale,
            title,
            description,
            body,
        ))
    }
}
