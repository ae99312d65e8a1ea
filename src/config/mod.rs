// src/config/mod.rs
//! Run configuration, built once at process start from the environment
//! (after `.env` has been applied) and passed by reference to every stage.

pub mod llm;
pub mod sources;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::relevance::RelevanceConfig;
use crate::locale::{parse_locale_list, Locale};

pub use llm::{LlmProvider, LlmSettings};
pub use sources::{default_sources, load_sources_from, FeedSource};

/// Articles per run when `--max` is omitted.
pub const DEFAULT_MAX_ARTICLES: usize = 3;
pub const DEFAULT_DEEPL_API_URL: &str = "https://api-free.deepl.com";
/// Upper bound for `TRANSLATION_RETRY_DELAY_MS` (one minute).
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

pub(crate) type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn lookup_nonempty(get: Lookup<'_>, key: &str) -> Option<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn lookup_parsed<T: FromStr>(
    get: Lookup<'_>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match lookup_nonempty(get, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Credential wrapper that never prints its value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(len={})", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationProvider {
    DeepL { api_key: Secret, api_url: String },
    /// Reuse the chat model configured under `LLM_*`.
    Llm,
    Mock,
}

impl TranslationProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeepL { .. } => "deepl",
            Self::Llm => "llm",
            Self::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT` directly; logging is set up before the full config is validated.
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub llm: LlmSettings,
    pub translation: TranslationProvider,
    pub locales: Vec<Locale>,
    pub blog_dir: PathBuf,
    pub i18n_dir: PathBuf,
    pub sources_path: Option<PathBuf>,
    pub ledger_path: PathBuf,
    pub http_timeout: Duration,
    pub translation_retries: u32,
    pub retry_base_delay: Duration,
    pub min_source_chars: usize,
    pub per_source_limit: usize,
    /// Keyword gate on listed articles; `None` lists everything new.
    pub relevance: Option<RelevanceConfig>,
    pub log_format: LogFormat,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Missing required keys or malformed values are fatal.
    pub fn from_lookup(get: Lookup<'_>) -> Result<Self, ConfigError> {
        let llm = LlmSettings::from_lookup(get)?;

        let locales = match lookup_nonempty(get, "TARGET_LOCALES") {
            Some(raw) => parse_locale_list(&raw).map_err(|reason| ConfigError::Invalid {
                key: "TARGET_LOCALES",
                reason,
            })?,
            None => Locale::ALL.to_vec(),
        };
        let needs_translation = locales.iter().any(|l| !l.is_source());

        let translation = match lookup_nonempty(get, "TRANSLATION_PROVIDER")
            .unwrap_or_else(|| "deepl".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "deepl" => {
                let api_key = lookup_nonempty(get, "DEEPL_API_KEY")
                    .map(Secret::new)
                    .unwrap_or_default();
                if api_key.is_empty() && needs_translation {
                    return Err(ConfigError::Missing("DEEPL_API_KEY"));
                }
                TranslationProvider::DeepL {
                    api_key,
                    api_url: lookup_nonempty(get, "DEEPL_API_URL")
                        .unwrap_or_else(|| DEFAULT_DEEPL_API_URL.to_string()),
                }
            }
            "llm" => TranslationProvider::Llm,
            "mock" => TranslationProvider::Mock,
            other => {
                return Err(ConfigError::Invalid {
                    key: "TRANSLATION_PROVIDER",
                    reason: format!("unsupported provider {other:?}"),
                })
            }
        };

        let timeout_secs: u64 = lookup_parsed(get, "HTTP_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                reason: "must be positive".to_string(),
            });
        }
        let retry_delay_ms: u64 = lookup_parsed(get, "TRANSLATION_RETRY_DELAY_MS", 500)?;
        if retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::Invalid {
                key: "TRANSLATION_RETRY_DELAY_MS",
                reason: format!("must be at most {MAX_RETRY_DELAY_MS}"),
            });
        }
        let relevance = relevance_from_lookup(get)?;

        Ok(Self {
            llm,
            translation,
            locales,
            blog_dir: PathBuf::from(
                lookup_nonempty(get, "BLOG_DIR").unwrap_or_else(|| "blog".to_string()),
            ),
            i18n_dir: PathBuf::from(
                lookup_nonempty(get, "I18N_DIR").unwrap_or_else(|| "i18n".to_string()),
            ),
            sources_path: lookup_nonempty(get, "SOURCES_PATH").map(PathBuf::from),
            ledger_path: PathBuf::from(
                lookup_nonempty(get, "LEDGER_PATH")
                    .unwrap_or_else(|| "data/processed_ids.txt".to_string()),
            ),
            http_timeout: Duration::from_secs(timeout_secs),
            translation_retries: lookup_parsed(get, "TRANSLATION_RETRIES", 2)?,
            retry_base_delay: Duration::from_millis(retry_delay_ms),
            min_source_chars: lookup_parsed(get, "MIN_SOURCE_CHARS", 200)?,
            per_source_limit: lookup_parsed(get, "PER_SOURCE_LIMIT", 10)?,
            relevance,
            log_format: LogFormat::parse(&lookup_nonempty(get, "LOG_FORMAT").unwrap_or_default()),
        })
    }

    /// Feed list from `SOURCES_PATH`, or the built-in list.
    pub fn feed_sources(&self) -> Result<Vec<FeedSource>, ConfigError> {
        match &self.sources_path {
            Some(p) => load_sources_from(p),
            None => Ok(default_sources()),
        }
    }
}

/// `RELEVANCE_PATH` (TOML rules) or `RELEVANCE_FILTER=builtin` enables the
/// gate; `RELEVANCE_THRESHOLD` overrides the threshold of either.
fn relevance_from_lookup(get: Lookup<'_>) -> Result<Option<RelevanceConfig>, ConfigError> {
    let mut cfg = match lookup_nonempty(get, "RELEVANCE_PATH") {
        Some(path) => RelevanceConfig::load(Path::new(&path))?,
        None => match lookup_nonempty(get, "RELEVANCE_FILTER")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "off" | "false" | "0" => return Ok(None),
            "builtin" | "on" | "true" | "1" => RelevanceConfig::builtin(),
            other => {
                return Err(ConfigError::Invalid {
                    key: "RELEVANCE_FILTER",
                    reason: format!("expected builtin or off, got {other:?}"),
                })
            }
        },
    };
    if let Some(raw) = lookup_nonempty(get, "RELEVANCE_THRESHOLD") {
        cfg.threshold = match raw.parse::<f32>() {
            Ok(t) if t.is_finite() && t >= 0.0 => t,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "RELEVANCE_THRESHOLD",
                    reason: format!("{raw:?} is not a non-negative number"),
                })
            }
        };
    }
    Ok(Some(cfg))
}

/// Apply a `.env` file to the process environment. Variables already set win.
/// Returns `false` when the file does not exist.
pub fn load_dotenv(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::Invalid {
            key: "env file",
            reason: format!("{}: {e}", path.display()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(&|k| map.get(k).cloned())
    }

    #[test]
    fn offline_config_uses_defaults() {
        let c = config(&[("LLM_PROVIDER", "mock"), ("TRANSLATION_PROVIDER", "mock")]).unwrap();
        assert_eq!(c.locales, Locale::ALL.to_vec());
        assert_eq!(c.blog_dir, PathBuf::from("blog"));
        assert_eq!(c.http_timeout, Duration::from_secs(30));
        assert_eq!(c.translation_retries, 2);
        assert_eq!(c.min_source_chars, 200);
        assert_eq!(c.log_format, LogFormat::Compact);
        assert!(c.sources_path.is_none());
        assert!(c.relevance.is_none());
    }

    #[test]
    fn relevance_gate_is_opt_in() {
        let c = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("RELEVANCE_FILTER", "builtin"),
            ("RELEVANCE_THRESHOLD", "25"),
        ])
        .unwrap();
        let r = c.relevance.unwrap();
        assert_eq!(r.threshold, 25.0);
        assert!(r.exclude.iter().any(|w| w == "arXiv"));

        let err = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("RELEVANCE_FILTER", "builtin"),
            ("RELEVANCE_THRESHOLD", "-1"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RELEVANCE_THRESHOLD", .. }));
    }

    #[test]
    fn relevance_rules_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relevance.toml");
        std::fs::write(&path, "threshold = 30.0\nexclude = [\"crypto\"]\n").unwrap();
        let c = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("RELEVANCE_PATH", path.to_str().unwrap()),
        ])
        .unwrap();
        let r = c.relevance.unwrap();
        assert_eq!(r.threshold, 30.0);
        assert_eq!(r.exclude, vec!["crypto".to_string()]);

        std::fs::write(&path, "threshold = \"high\"\n").unwrap();
        let err = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("RELEVANCE_PATH", path.to_str().unwrap()),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Relevance { .. }));
    }

    #[test]
    fn oversized_retry_delay_is_rejected() {
        let err = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("TRANSLATION_RETRY_DELAY_MS", "18446744073709551615"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TRANSLATION_RETRY_DELAY_MS", .. }));
    }

    #[test]
    fn deepl_key_required_only_when_translating() {
        let err = config(&[("LLM_PROVIDER", "mock")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DEEPL_API_KEY")));

        let c = config(&[("LLM_PROVIDER", "mock"), ("TARGET_LOCALES", "en")]).unwrap();
        assert_eq!(c.translation.name(), "deepl");
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let err = config(&[
            ("LLM_PROVIDER", "mock"),
            ("TRANSLATION_PROVIDER", "mock"),
            ("HTTP_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HTTP_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let s = Secret::new("sk-very-secret");
        assert_eq!(format!("{s:?}"), "Secret(len=14)");
    }
}
