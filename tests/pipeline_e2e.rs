// tests/pipeline_e2e.rs
// End-to-end runs over a temp content tree with offline model and translator.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use blog_automation::ingest::ledger::SeenLedger;
use blog_automation::ingest::providers::JsonFileProvider;
use blog_automation::ingest::SourceLister;
use blog_automation::publish::{front_matter, ContentLayout, Publisher};
use blog_automation::transform::{MockModel, Transformer};
use blog_automation::translate::{MockBackend, TranslationBackend, Translator};
use blog_automation::{ItemState, Locale, Pipeline, TranslationError};
use chrono::NaiveDate;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/articles.json");

struct Site {
    _dir: tempfile::TempDir,
    blog: PathBuf,
    i18n: PathBuf,
    ledger: PathBuf,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self {
            _dir: dir,
            blog: root.join("blog"),
            i18n: root.join("i18n"),
            ledger: root.join("data/processed_ids.txt"),
        }
    }

    fn pipeline(&self, input: &Path, backend: Box<dyn TranslationBackend>) -> Pipeline {
        Pipeline::new(
            SourceLister::new(vec![Box::new(JsonFileProvider::new(input))]),
            Transformer::new(Box::new(MockModel), 200),
            Translator::new(backend, Locale::ALL.to_vec()).with_retries(2, Duration::ZERO),
            Publisher::new(ContentLayout::new(&self.blog, &self.i18n))
                .with_date(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()),
            SeenLedger::load(&self.ledger).unwrap(),
        )
    }

    fn post(&self, locale: Locale, slug: &str) -> PathBuf {
        ContentLayout::new(&self.blog, &self.i18n).post_path(locale, slug)
    }
}

fn long_text(topic: &str) -> String {
    format!("{topic} ").repeat(40)
}

fn write_articles(path: &Path, articles: &[(&str, &str, String)]) {
    let items: Vec<serde_json::Value> = articles
        .iter()
        .enumerate()
        .map(|(i, (url, title, text))| {
            serde_json::json!({
                "url": url,
                "title": title,
                "raw_text": text,
                "source_name": "Example News",
                "published_at": 1_749_556_800u64 + i as u64,
            })
        })
        .collect();
    fs::write(path, serde_json::to_string(&items).unwrap()).unwrap();
}

/// Fails every Japanese request whose text mentions `poison`.
struct FailsJapanese {
    poison: &'static str,
}

#[async_trait]
impl TranslationBackend for FailsJapanese {
    async fn translate(&self, text: &str, target: Locale) -> Result<String, TranslationError> {
        if target == Locale::Ja && text.contains(self.poison) {
            return Err(TranslationError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        MockBackend.translate(text, target).await
    }

    fn name(&self) -> &str {
        "fails-japanese"
    }
}

#[tokio::test]
async fn publishes_valid_article_and_skips_empty_one() {
    let site = Site::new();
    let mut pipeline = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend));

    let summary = pipeline.run(5).await;
    assert_eq!(summary.listed, 2);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.exit_code(), 0);

    let done = &summary.items[0];
    assert_eq!(done.state, ItemState::Done);
    let slug = done.slug.clone().unwrap();
    assert!(slug.starts_with("analysis-open-weights-release"));
    assert!(matches!(summary.items[1].state, ItemState::Skipped(_)));

    for locale in Locale::ALL {
        assert!(site.post(locale, &slug).is_file(), "{locale} missing");
    }
    let zh = fs::read_to_string(site.post(Locale::Zh, &slug)).unwrap();
    let parsed = front_matter::parse(&zh).unwrap();
    assert!(parsed.front.title.starts_with("[中文翻译] "));
    assert_eq!(parsed.front.source_url, "https://news.example.test/open-weights");
    assert_eq!(parsed.front.slug, slug);

    let ledger = fs::read_to_string(&site.ledger).unwrap();
    assert_eq!(ledger.lines().count(), 2);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let site = Site::new();
    let first = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(5).await;
    assert_eq!(first.written, 3);

    let second = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(5).await;
    assert_eq!(second.listed, 0);
    assert_eq!(second.written, 0);
    assert_eq!(second.exit_code(), 0);
}

#[tokio::test]
async fn lost_ledger_still_never_duplicates_files() {
    let site = Site::new();
    let first = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(5).await;
    let slug = first.items[0].slug.clone().unwrap();
    let before = fs::read_to_string(site.post(Locale::En, &slug)).unwrap();

    fs::remove_file(&site.ledger).unwrap();
    let again = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(5).await;
    assert_eq!(again.listed, 2);
    assert_eq!(again.written, 0);
    assert_eq!(again.items[0].slug.as_deref(), Some(slug.as_str()));
    assert_eq!(again.items[0].duplicates, 3);
    assert_eq!(
        fs::read_to_string(site.post(Locale::En, &slug)).unwrap(),
        before
    );
    assert!(!site.blog.join(format!("{slug}-2")).exists());
}

#[tokio::test]
async fn failing_locale_is_isolated_and_resumed_later() {
    let site = Site::new();
    let input = site.blog.parent().unwrap().join("input.json");
    write_articles(
        &input,
        &[
            ("https://x.test/1", "Flaky story", long_text("alpha")),
            ("https://y.test/2", "Steady story", long_text("beta")),
        ],
    );

    let summary = site
        .pipeline(&input, Box::new(FailsJapanese { poison: "Flaky" }))
        .run(5)
        .await;
    assert_eq!(summary.done, 2);
    assert_eq!(summary.written, 5);
    assert_eq!(summary.locales_skipped, 1);
    assert_eq!(summary.exit_code(), 0);

    let x = summary.items[0].slug.clone().unwrap();
    let y = summary.items[1].slug.clone().unwrap();
    assert_eq!(summary.items[0].locales_skipped, vec![Locale::Ja]);
    assert!(site.post(Locale::En, &x).is_file());
    assert!(site.post(Locale::Zh, &x).is_file());
    assert!(!site.post(Locale::Ja, &x).exists());
    for locale in Locale::ALL {
        assert!(site.post(locale, &y).is_file());
    }

    // Only the complete item is remembered; the next run fills the gap.
    let resumed = site.pipeline(&input, Box::new(MockBackend)).run(5).await;
    assert_eq!(resumed.listed, 1);
    assert_eq!(resumed.written, 1);
    assert_eq!(resumed.items[0].duplicates, 2);
    assert!(site.post(Locale::Ja, &x).is_file());
}

#[tokio::test]
async fn same_titles_get_distinct_slugs() {
    let site = Site::new();
    let input = site.blog.parent().unwrap().join("input.json");
    write_articles(
        &input,
        &[
            ("https://a.test/1", "Model launch", long_text("one")),
            ("https://b.test/2", "Model launch", long_text("two")),
        ],
    );

    let summary = site.pipeline(&input, Box::new(MockBackend)).run(5).await;
    let slugs: Vec<_> = summary.items.iter().filter_map(|i| i.slug.clone()).collect();
    assert_eq!(slugs, vec!["analysis-model-launch", "analysis-model-launch-2"]);
    assert_eq!(summary.written, 6);
}

#[tokio::test]
async fn zero_max_does_nothing() {
    let site = Site::new();
    let summary = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(0).await;
    assert_eq!(summary.listed, 0);
    assert_eq!(summary.exit_code(), 0);
    assert!(!site.blog.exists());
}

#[tokio::test]
async fn publish_failure_marks_item_failed() {
    let site = Site::new();
    fs::write(&site.blog, "not a directory").unwrap();

    let summary = site.pipeline(Path::new(FIXTURE), Box::new(MockBackend)).run(1).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.publish_failures, 1);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.exit_code(), 1);
    assert!(!site.ledger.exists());

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["items"][0]["state"], "failed");
}

#[tokio::test]
async fn posts_in_date_prefixed_directories_are_not_republished() {
    let site = Site::new();
    let input = site.blog.parent().unwrap().join("input.json");
    write_articles(
        &input,
        &[("https://n.test/ow", "Open weights", long_text("weights"))],
    );
    for locale in Locale::ALL {
        let root = site.post(locale, "x").parent().unwrap().parent().unwrap().to_path_buf();
        let dated = root.join("2025-06-10-analysis-open-weights");
        fs::create_dir_all(&dated).unwrap();
        fs::write(
            dated.join("index.md"),
            "---\nslug: analysis-open-weights\nsource_url: https://n.test/ow\n---\n\nOld.\n",
        )
        .unwrap();
    }

    let summary = site.pipeline(&input, Box::new(MockBackend)).run(5).await;
    assert_eq!(summary.written, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.items[0].slug.as_deref(), Some("analysis-open-weights"));
    assert_eq!(summary.items[0].duplicates, 3);
    assert!(!site.post(Locale::En, "analysis-open-weights").exists());
}
