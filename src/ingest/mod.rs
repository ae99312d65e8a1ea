// src/ingest/mod.rs
pub mod ledger;
pub mod providers;
pub mod relevance;
pub mod types;

use std::collections::HashSet;

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

use crate::error::RetrievalError;
use crate::ingest::ledger::SeenLedger;
use crate::ingest::relevance::{RelevanceConfig, RelevanceFilter};
use crate::ingest::types::{SourceArticle, SourceProvider};

const LINE_MAX_CHARS: usize = 1_500;
const BODY_MAX_CHARS: usize = 10_000;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total articles parsed from providers.");
        describe_counter!(
            "ingest_listed_total",
            "Articles handed to the pipeline after ledger filtering."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!(
            "ingest_page_fallback_total",
            "Items whose body was taken from the linked page."
        );
        describe_counter!(
            "ingest_irrelevant_total",
            "Articles dropped by the relevance gate."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|h[1-6]|blockquote|pre|tr|section|article)\s*>")
        .unwrap()
});

fn decode_and_fold_quotes(s: &str) -> String {
    html_escape::decode_html_entities(s)
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Take at most `max` chars (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Single-line text: entities decoded, tags stripped, whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let decoded = decode_and_fold_quotes(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    truncate_chars(collapsed.trim(), LINE_MAX_CHARS)
}

/// Article body: like [`normalize_text`] but block-level HTML becomes paragraph breaks.
pub fn normalize_body(s: &str) -> String {
    let decoded = decode_and_fold_quotes(s);
    let blocks = RE_BLOCK_END.replace_all(&decoded, "\n\n");
    let stripped = RE_TAGS.replace_all(&blocks, "");

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in stripped.lines() {
        let line = RE_WS.replace_all(line, " ");
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    truncate_chars(&paragraphs.join("\n\n"), BODY_MAX_CHARS)
}

/// Result of one listing pass.
#[derive(Debug, Default)]
pub struct Listing {
    pub articles: Vec<SourceArticle>,
    pub errors: Vec<RetrievalError>,
    /// Providers actually asked for items.
    pub fetched_providers: usize,
}

/// Enumerates new source articles across providers, bounded by a max count.
pub struct SourceLister {
    providers: Vec<Box<dyn SourceProvider>>,
    relevance: Option<RelevanceFilter>,
}

impl SourceLister {
    /// Providers are visited by ascending priority; ties keep the given order.
    pub fn new(mut providers: Vec<Box<dyn SourceProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            relevance: None,
        }
    }

    /// Drop new articles that fail the keyword gate before they count toward `max`.
    pub fn with_relevance(mut self, rules: &RelevanceConfig) -> Result<Self, regex::Error> {
        self.relevance = Some(RelevanceFilter::new(rules)?);
        Ok(self)
    }

    /// Keep articles that pass the gate; order by publish time, then by combined score.
    fn gate(&self, mut batch: Vec<SourceArticle>, provider: &str) -> Vec<SourceArticle> {
        let Some(filter) = &self.relevance else {
            batch.sort_by_key(|a| a.published_at);
            return batch;
        };
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let mut kept: Vec<(SourceArticle, f32)> = Vec::with_capacity(batch.len());
        for a in batch {
            let r = filter.evaluate(&a, now);
            if r.passed {
                tracing::debug!(
                    target: "ingest",
                    title = %a.title,
                    score = r.score,
                    quality = r.quality,
                    matched = ?r.matched,
                    "relevant"
                );
                let combined = r.combined();
                kept.push((a, combined));
            } else {
                tracing::debug!(
                    target: "ingest",
                    provider,
                    title = %a.title,
                    score = r.score,
                    reasons = ?r.reasons,
                    "dropped as irrelevant"
                );
                counter!("ingest_irrelevant_total").increment(1);
            }
        }
        kept.sort_by(|(a, sa), (b, sb)| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| sb.total_cmp(sa))
        });
        kept.into_iter().map(|(a, _)| a).collect()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// List up to `max` articles whose ids are not in `ledger`.
    ///
    /// Each provider's new items are ordered by publish time (oldest first).
    /// Providers are fetched lazily: once `max` items are listed the rest are
    /// not contacted, and `max == 0` contacts nobody. A failing provider is
    /// recorded in [`Listing::errors`] and the next provider is tried.
    pub async fn list(&self, max: usize, ledger: &SeenLedger) -> Listing {
        ensure_metrics_described();

        let mut listing = Listing::default();
        let mut listed_ids: HashSet<String> = HashSet::new();

        for p in &self.providers {
            if listing.articles.len() >= max {
                break;
            }
            listing.fetched_providers += 1;

            match p.fetch_latest().await {
                Ok(mut batch) => {
                    let found = batch.len();
                    batch.retain(|a| !ledger.contains(&a.id) && listed_ids.insert(a.id.clone()));
                    let batch = self.gate(batch, p.name());

                    let room = max - listing.articles.len();
                    let fresh = batch.len();
                    listing.articles.extend(batch.into_iter().take(room));
                    tracing::info!(
                        target: "ingest",
                        provider = p.name(),
                        found,
                        fresh,
                        listed = listing.articles.len(),
                        "provider listed"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, provider = p.name(), "provider error");
                    counter!("ingest_provider_errors_total").increment(1);
                    listing.errors.push(e);
                }
            }
        }

        counter!("ingest_listed_total").increment(listing.articles.len() as u64);
        listing
    }
}
