//! Chat Completions client shared by the content rewriter and the LLM translator.
//! Works against OpenAI, GLM and DeepSeek since they all expose the same endpoint shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmSettings;

pub const USER_AGENT: &str = concat!("blog-automation/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reply had no content")]
    Empty,
}

pub struct ChatClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl ChatClient {
    /// `http` should carry the per-call timeout.
    pub fn new(http: reqwest::Client, settings: LlmSettings) -> Self {
        Self { http, settings }
    }

    pub fn provider_name(&self) -> &'static str {
        self.settings.provider.name()
    }

    /// One system + one user message; returns the first choice's text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ChatError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.settings.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let resp = self
            .http
            .post(self.settings.completions_url())
            .bearer_auth(self.settings.api_key.expose())
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: crate::ingest::truncate_chars(&body, 300),
            });
        }

        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ChatError::Empty)
    }
}

/// Strip a markdown code fence wrapping the reply (```json ... ``` or ``` ... ```).
///
/// Only a fence that opens before the payload counts: a bare JSON object whose
/// string values contain fenced code is returned as-is.
pub fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(start) = t.find("```") else {
        return t;
    };
    if t.find('{').is_some_and(|brace| brace < start) {
        return t;
    }
    let after = &t[start + 3..];
    // Skip the info string (e.g. "json") up to the end of the line.
    let after = match after.find('\n') {
        Some(nl) if after[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &after[nl + 1..],
        _ => after,
    };
    match after.rfind("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}
