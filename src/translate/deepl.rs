// src/translate/deepl.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TranslationBackend;
use crate::config::Secret;
use crate::error::TranslationError;
use crate::locale::Locale;

/// DeepL REST API (`/v2/translate`), English source.
pub struct DeepLBackend {
    http: reqwest::Client,
    api_key: Secret,
    api_url: String,
}

impl DeepLBackend {
    pub fn new(http: reqwest::Client, api_key: Secret, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            api_url: api_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/translate", self.api_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct Req<'a> {
    text: Vec<&'a str>,
    source_lang: &'a str,
    target_lang: &'a str,
    preserve_formatting: bool,
}

#[derive(Deserialize)]
struct Resp {
    translations: Vec<Translated>,
}

#[derive(Deserialize)]
struct Translated {
    text: String,
}

#[async_trait]
impl TranslationBackend for DeepLBackend {
    async fn translate(&self, text: &str, target: Locale) -> Result<String, TranslationError> {
        if target.is_source() {
            return Ok(text.to_string());
        }

        let req = Req {
            text: vec![text],
            source_lang: Locale::En.deepl_code(),
            target_lang: target.deepl_code(),
            preserve_formatting: true,
        };
        let resp = self
            .http
            .post(self.endpoint())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("DeepL-Auth-Key {}", self.api_key.expose()),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| TranslationError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TranslationError::Status {
                status: status.as_u16(),
                body: crate::ingest::truncate_chars(&body, 300),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| TranslationError::Http(e.to_string()))?;
        body.translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(TranslationError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "deepl"
    }
}
