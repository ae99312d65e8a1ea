// src/locale.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language variants the blog is published in. English is the source language.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Zh,
    Ja,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Zh, Locale::Ja];

    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
            Locale::Ja => "ja",
        }
    }

    /// Upper-case language code used by DeepL.
    pub fn deepl_code(self) -> &'static str {
        match self {
            Locale::En => "EN",
            Locale::Zh => "ZH",
            Locale::Ja => "JA",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Zh => "Simplified Chinese",
            Locale::Ja => "Japanese",
        }
    }

    /// Posts are written in English first; other locales are translations.
    pub fn is_source(self) -> bool {
        self == Locale::En
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "zh" | "zh-cn" | "zh-hans" => Ok(Locale::Zh),
            "ja" | "jp" => Ok(Locale::Ja),
            other => Err(format!("unknown locale {other:?}")),
        }
    }
}

/// Parse a comma separated locale list, keeping first-seen order.
pub fn parse_locale_list(s: &str) -> Result<Vec<Locale>, String> {
    let mut out = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let locale: Locale = part.parse()?;
        if !out.contains(&locale) {
            out.push(locale);
        }
    }
    if out.is_empty() {
        return Err("no locales configured".to_string());
    }
    Ok(out)
}
