// src/pipeline.rs
//! Drives each listed article through transform → translate → publish, one
//! item at a time, and aggregates a run summary.
//!
//! Per item: `Listed → Transforming → Translating → Publishing → Done | Skipped | Failed`.
//! There is no rollback; a partially published item is completed by a later
//! run because the publisher re-checks every (locale, slug) pair.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::{LlmProvider, PipelineConfig, TranslationProvider};
use crate::ingest::ledger::SeenLedger;
use crate::ingest::providers::{JsonFileProvider, RssProvider};
use crate::ingest::types::{SourceArticle, SourceProvider};
use crate::ingest::{Listing, SourceLister};
use crate::llm::{ChatClient, USER_AGENT};
use crate::locale::Locale;
use crate::publish::{ContentLayout, Publisher};
use crate::transform::{ChatModel, ContentModel, MockModel, SlugRegistry, Transformer};
use crate::translate::{
    ChatBackend, DeepLBackend, MockBackend, TranslationBackend, Translator,
};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Items reaching a terminal state, by state.");
        describe_counter!("publish_written_total", "Post files written.");
        describe_counter!(
            "translate_locale_skipped_total",
            "Locales dropped after exhausting translation retries."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ItemState {
    Listed,
    Transforming,
    Translating,
    Publishing,
    Done,
    Skipped(String),
    Failed(String),
}

impl ItemState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Listed => "listed",
            Self::Transforming => "transforming",
            Self::Translating => "translating",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped(_) | Self::Failed(_))
    }
}

/// What happened to one source article.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub source_id: String,
    pub title: String,
    pub slug: Option<String>,
    #[serde(flatten)]
    pub state: ItemState,
    pub written: usize,
    pub duplicates: usize,
    pub publish_failures: usize,
    pub locales_skipped: Vec<Locale>,
}

impl ItemReport {
    fn new(article: &SourceArticle) -> Self {
        Self {
            source_id: article.id.clone(),
            title: article.title.clone(),
            slug: None,
            state: ItemState::Listed,
            written: 0,
            duplicates: 0,
            publish_failures: 0,
            locales_skipped: Vec::new(),
        }
    }

    fn advance(&mut self, next: ItemState) {
        debug_assert!(!self.state.is_terminal(), "item already settled");
        tracing::debug!(
            source_id = %self.source_id,
            from = self.state.label(),
            to = next.label(),
            "item state"
        );
        self.state = next;
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub listed: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub written: usize,
    pub duplicates: usize,
    pub publish_failures: usize,
    pub locales_skipped: usize,
    pub retrieval_errors: usize,
    pub dry_run: bool,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    fn absorb(&mut self, item: ItemReport) {
        match item.state {
            ItemState::Done => self.done += 1,
            ItemState::Skipped(_) => self.skipped += 1,
            ItemState::Failed(_) => self.failed += 1,
            _ => {}
        }
        self.written += item.written;
        self.duplicates += item.duplicates;
        self.publish_failures += item.publish_failures;
        self.locales_skipped += item.locales_skipped.len();
        self.items.push(item);
    }

    pub fn summary_line(&self) -> String {
        format!(
            "summary: listed={} done={} skipped={} failed={} written={} duplicates={} publish_failures={} locales_skipped={} retrieval_errors={}{}",
            self.listed,
            self.done,
            self.skipped,
            self.failed,
            self.written,
            self.duplicates,
            self.publish_failures,
            self.locales_skipped,
            self.retrieval_errors,
            if self.dry_run { " (dry run)" } else { "" },
        )
    }

    /// 0 unless an item failed.
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

pub struct Pipeline {
    lister: SourceLister,
    transformer: Transformer,
    translator: Translator,
    publisher: Publisher,
    ledger: SeenLedger,
}

impl Pipeline {
    pub fn new(
        lister: SourceLister,
        transformer: Transformer,
        translator: Translator,
        publisher: Publisher,
        ledger: SeenLedger,
    ) -> Self {
        Self {
            lister,
            transformer,
            translator,
            publisher,
            ledger,
        }
    }

    /// Wire every stage from the run configuration.
    ///
    /// `input` replaces the feed list with a JSON file of articles. Dry runs
    /// never touch the content tree or the ledger file.
    pub fn from_config(
        config: &PipelineConfig,
        input: Option<&Path>,
        dry_run: bool,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10).min(config.http_timeout))
            .timeout(config.http_timeout)
            .build()
            .context("building HTTP client")?;

        let providers: Vec<Box<dyn SourceProvider>> = match input {
            Some(path) => vec![Box::new(JsonFileProvider::new(path))],
            None => config
                .feed_sources()?
                .iter()
                .map(|s| {
                    Box::new(
                        RssProvider::from_source(s, http.clone()).with_limit(config.per_source_limit),
                    ) as Box<dyn SourceProvider>
                })
                .collect(),
        };

        let chat = || ChatClient::new(http.clone(), config.llm.clone());
        let model: Box<dyn ContentModel> = match config.llm.provider {
            LlmProvider::Mock => Box::new(MockModel),
            _ => Box::new(ChatModel::new(chat())),
        };
        let backend: Box<dyn TranslationBackend> = match &config.translation {
            TranslationProvider::DeepL { api_key, api_url } => {
                Box::new(DeepLBackend::new(http.clone(), api_key.clone(), api_url.clone()))
            }
            TranslationProvider::Llm if config.llm.provider != LlmProvider::Mock => {
                Box::new(ChatBackend::new(chat()))
            }
            TranslationProvider::Llm | TranslationProvider::Mock => Box::new(MockBackend),
        };

        let ledger = if dry_run {
            SeenLedger::in_memory()
        } else {
            SeenLedger::load(&config.ledger_path)
                .with_context(|| format!("reading ledger {}", config.ledger_path.display()))?
        };

        let mut lister = SourceLister::new(providers);
        if let Some(rules) = &config.relevance {
            lister = lister.with_relevance(rules).context("compiling relevance keywords")?;
        }
        let transformer = Transformer::new(model, config.min_source_chars);
        let translator = Translator::new(backend, config.locales.clone())
            .with_retries(config.translation_retries, config.retry_base_delay);

        tracing::info!(
            model = transformer.model_name(),
            translator = translator.backend_name(),
            locales = ?config.locales,
            blog_dir = %config.blog_dir.display(),
            relevance = config.relevance.as_ref().map(|r| r.threshold),
            seen = ledger.len(),
            "pipeline configured"
        );

        Ok(Self::new(
            lister,
            transformer,
            translator,
            Publisher::new(ContentLayout::new(&config.blog_dir, &config.i18n_dir)).dry_run(dry_run),
            ledger,
        ))
    }

    /// List without processing; the ledger is left untouched.
    pub async fn collect(&self, max: usize) -> Listing {
        self.lister.list(max, &self.ledger).await
    }

    /// Process up to `max` new articles.
    pub async fn run(&mut self, max: usize) -> RunSummary {
        ensure_metrics_described();

        let mut summary = RunSummary {
            dry_run: self.publisher.is_dry_run(),
            ..RunSummary::default()
        };
        if max == 0 {
            tracing::info!("max is 0, nothing to do");
            return summary;
        }

        let mut slugs = self.publisher.scan_published(self.translator.locales());
        let listing = self.lister.list(max, &self.ledger).await;
        summary.listed = listing.articles.len();
        summary.retrieval_errors = listing.errors.len();
        if listing.articles.is_empty() {
            tracing::info!(retrieval_errors = summary.retrieval_errors, "no new articles");
        }

        for (idx, article) in listing.articles.iter().enumerate() {
            tracing::info!(
                source_id = %article.id,
                source = %article.source_name,
                "[{}/{}] {}",
                idx + 1,
                summary.listed,
                article.title
            );
            let report = self.process(article, &mut slugs).await;
            counter!("pipeline_items_total", "state" => report.state.label()).increment(1);
            summary.absorb(report);
        }

        counter!("publish_written_total").increment(summary.written as u64);
        tracing::info!("{}", summary.summary_line());
        summary
    }

    async fn process(&mut self, article: &SourceArticle, slugs: &mut SlugRegistry) -> ItemReport {
        let mut report = ItemReport::new(article);

        report.advance(ItemState::Transforming);
        let draft = match self.transformer.transform(article, slugs).await {
            Ok(d) => d,
            Err(e) if e.is_content_rejection() => {
                tracing::warn!(source_id = %article.id, stage = "transform", error = %e, "item skipped");
                self.settle(&article.id);
                report.advance(ItemState::Skipped(e.to_string()));
                return report;
            }
            Err(e) => {
                tracing::error!(source_id = %article.id, stage = "transform", error = %e, "item failed");
                report.advance(ItemState::Failed(e.to_string()));
                return report;
            }
        };
        report.slug = Some(draft.slug.clone());

        // Only locales not yet on disk need translating.
        let (existing, pending): (Vec<Locale>, Vec<Locale>) = self
            .translator
            .locales()
            .iter()
            .copied()
            .partition(|l| self.publisher.exists(*l, &draft.slug));
        report.duplicates = existing.len();
        if pending.is_empty() {
            tracing::info!(source_id = %article.id, slug = %draft.slug, "already published in every locale");
            self.settle(&article.id);
            report.advance(ItemState::Skipped("duplicate".to_string()));
            return report;
        }

        report.advance(ItemState::Translating);
        let mut posts = Vec::with_capacity(pending.len());
        for outcome in self.translator.localize_only(&draft, &pending).await {
            match outcome.result {
                Ok(post) => posts.push(post),
                Err(e) => {
                    tracing::warn!(
                        source_id = %article.id,
                        stage = "translate",
                        slug = %draft.slug,
                        locale = %outcome.locale,
                        attempts = outcome.attempts,
                        error = %e,
                        "locale skipped"
                    );
                    counter!("translate_locale_skipped_total").increment(1);
                    report.locales_skipped.push(outcome.locale);
                }
            }
        }
        if posts.is_empty() {
            report.advance(ItemState::Skipped("no locale translated".to_string()));
            return report;
        }

        report.advance(ItemState::Publishing);
        let published = self.publisher.publish(&posts);
        report.written = published.written;
        report.duplicates += published.skipped_duplicate;
        report.publish_failures = published.failed;

        if published.failed > 0 {
            tracing::error!(
                source_id = %article.id,
                stage = "publish",
                slug = %draft.slug,
                failed = published.failed,
                "item failed"
            );
            report.advance(ItemState::Failed(format!(
                "{} file(s) failed to write",
                published.failed
            )));
        } else if published.written > 0 {
            if report.locales_skipped.is_empty() {
                self.settle(&article.id);
            }
            report.advance(ItemState::Done);
        } else {
            self.settle(&article.id);
            report.advance(ItemState::Skipped("duplicate".to_string()));
        }
        report
    }

    /// Remember an item that needs no further runs.
    fn settle(&mut self, source_id: &str) {
        if self.publisher.is_dry_run() {
            return;
        }
        if let Err(e) = self.ledger.record(source_id) {
            tracing::warn!(source_id, error = %e, "could not record processed id");
        }
    }
}
