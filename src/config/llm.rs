// src/config/llm.rs
use std::fmt;

use super::{lookup_nonempty, Lookup, Secret};
use crate::error::ConfigError;

/// Chat model vendors. All of them speak the OpenAI Chat Completions dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Glm,
    DeepSeek,
    /// Offline rewrite, no network.
    Mock,
}

impl LlmProvider {
    /// Case-insensitive; accepts the names used in `.env` files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "glm" | "zhipu" => Some(Self::Glm),
            "deepseek" => Some(Self::DeepSeek),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Glm => "glm",
            Self::DeepSeek => "deepseek",
            Self::Mock => "mock",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Glm => "https://open.bigmodel.cn/api/paas/v4",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Mock => "",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Glm => "glm-4-flash",
            Self::DeepSeek => "deepseek-chat",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Env keys consulted for the chat model key, in order.
const API_KEY_VARS: [&str; 4] = [
    "LLM_API_KEY",
    "DEEPSEEK_API_KEY",
    "GLM_API_KEY",
    "OPENAI_API_KEY",
];

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub api_key: Secret,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmSettings {
    pub(crate) fn from_lookup(get: Lookup<'_>) -> Result<Self, ConfigError> {
        let provider = match lookup_nonempty(get, "LLM_PROVIDER") {
            Some(raw) => LlmProvider::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "LLM_PROVIDER",
                reason: format!("unsupported provider {raw:?}"),
            })?,
            None => LlmProvider::DeepSeek,
        };

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|k| lookup_nonempty(get, k))
            .map(Secret::new)
            .unwrap_or_default();
        if api_key.is_empty() && provider != LlmProvider::Mock {
            return Err(ConfigError::Missing("LLM_API_KEY"));
        }

        let base_url = lookup_nonempty(get, "LLM_BASE_URL")
            .unwrap_or_else(|| provider.default_base_url().to_string());
        let model =
            lookup_nonempty(get, "LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        Ok(Self {
            provider,
            api_key,
            base_url,
            model,
            temperature: 0.7,
            max_tokens: 2000,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Offline settings used by tests and `LLM_PROVIDER=mock`.
    pub fn mock() -> Self {
        Self {
            provider: LlmProvider::Mock,
            api_key: Secret::default(),
            base_url: String::new(),
            model: LlmProvider::Mock.default_model().to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<LlmSettings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LlmSettings::from_lookup(&|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_to_deepseek_and_requires_key() {
        let err = settings(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("LLM_API_KEY")));

        let s = settings(&[("DEEPSEEK_API_KEY", "sk-1")]).unwrap();
        assert_eq!(s.provider, LlmProvider::DeepSeek);
        assert_eq!(s.model, "deepseek-chat");
        assert_eq!(s.completions_url(), "https://api.deepseek.com/chat/completions");
        assert_eq!(s.api_key.expose(), "sk-1");
    }

    #[test]
    fn generic_key_wins_and_overrides_apply() {
        let s = settings(&[
            ("LLM_PROVIDER", "GLM"),
            ("LLM_API_KEY", "generic"),
            ("GLM_API_KEY", "specific"),
            ("LLM_MODEL", "glm-4-plus"),
        ])
        .unwrap();
        assert_eq!(s.provider, LlmProvider::Glm);
        assert_eq!(s.api_key.expose(), "generic");
        assert_eq!(s.model, "glm-4-plus");
        assert_eq!(
            s.completions_url(),
            "https://open.bigmodel.cn/api/paas/v4/chat/completions"
        );
    }

    #[test]
    fn mock_needs_no_key_and_unknown_provider_is_rejected() {
        assert!(settings(&[("LLM_PROVIDER", "mock")]).is_ok());
        let err = settings(&[("LLM_PROVIDER", "bard"), ("LLM_API_KEY", "x")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LLM_PROVIDER", .. }));
    }
}
