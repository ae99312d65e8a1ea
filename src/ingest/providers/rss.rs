// src/ingest/providers/rss.rs
use std::collections::HashMap;

use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::FeedSource;
use crate::error::RetrievalError;
use crate::ingest::types::{article_id, SourceArticle, SourceProvider};
use crate::ingest::{normalize_body, normalize_text, truncate_chars};

/// Items taken from a single feed per run.
pub const DEFAULT_PER_SOURCE_LIMIT: usize = 10;
const SUMMARY_MAX_CHARS: usize = 500;

static RE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>|<footer\b.*?</footer>|<header\b.*?</header>|<aside\b.*?</aside>|<!--.*?-->")
        .unwrap()
});
static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article\b[^>]*>(.*)</article>").unwrap());
static RE_MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*)</main>").unwrap());
static RE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body>").unwrap());

/// Readable text of a web page: the `<article>`, else `<main>`, else `<body>`,
/// with scripts, styles and page chrome removed.
pub fn extract_page_text(html: &str) -> String {
    let cleaned = RE_NOISE.replace_all(html, " ");
    let inner = [&*RE_ARTICLE, &*RE_MAIN, &*RE_BODY]
        .iter()
        .find_map(|re| re.captures(&cleaned).and_then(|c| c.get(1)))
        .map_or(&*cleaned, |m| m.as_str());
    normalize_body(inner)
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "encoded", alias = "content:encoded")]
    content_encoded: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

pub struct RssProvider {
    name: String,
    category: String,
    priority: u8,
    limit: usize,
    mode: Mode,
}

enum Mode {
    /// Feed XML plus linked pages keyed by URL.
    Fixture {
        xml: String,
        pages: HashMap<String, String>,
    },
    Http { url: String, client: reqwest::Client },
}

impl RssProvider {
    /// Live feed fetched with the shared client (timeouts are set on the client).
    pub fn from_source(source: &FeedSource, client: reqwest::Client) -> Self {
        Self {
            name: source.name.clone(),
            category: source.category.clone(),
            priority: source.priority,
            limit: DEFAULT_PER_SOURCE_LIMIT,
            mode: Mode::Http {
                url: source.url.clone(),
                client,
            },
        }
    }

    /// Feed content supplied up front; no network.
    pub fn from_fixture(source: &FeedSource, xml: &str) -> Self {
        Self {
            name: source.name.clone(),
            category: source.category.clone(),
            priority: source.priority,
            limit: DEFAULT_PER_SOURCE_LIMIT,
            mode: Mode::Fixture {
                xml: xml.to_string(),
                pages: HashMap::new(),
            },
        }
    }

    /// Serve `html` for `url` when an item needs its linked page (fixture mode only).
    pub fn with_fixture_page(mut self, url: &str, html: &str) -> Self {
        if let Mode::Fixture { pages, .. } = &mut self.mode {
            pages.insert(url.to_string(), html.to_string());
        }
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn parse_feed(&self, xml: &str) -> Result<Vec<SourceArticle>, RetrievalError> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).map_err(|e| RetrievalError::Malformed {
            provider: self.name.clone(),
            message: e.to_string(),
        })?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.limit));
        for it in rss.channel.item.into_iter().take(self.limit) {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let url = it.link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() && url.is_empty() {
                continue;
            }
            let title = if title.is_empty() {
                "Untitled".to_string()
            } else {
                title
            };

            let description = it.description.as_deref().unwrap_or_default();
            let body_html = it
                .content_encoded
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(description);

            out.push(SourceArticle {
                id: article_id(&url, &title),
                url,
                title,
                raw_text: normalize_body(body_html),
                summary: truncate_chars(&normalize_text(description), SUMMARY_MAX_CHARS),
                source_name: self.name.clone(),
                category: self.category.clone(),
                priority: self.priority,
                published_at: it
                    .pub_date
                    .as_deref()
                    .map(parse_rfc2822_to_unix)
                    .unwrap_or(0),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

impl RssProvider {
    async fn fetch_feed(&self) -> Result<String, RetrievalError> {
        match &self.mode {
            Mode::Fixture { xml, .. } => Ok(xml.clone()),
            Mode::Http { url, client } => {
                let unreachable = |e: reqwest::Error| RetrievalError::Unreachable {
                    provider: self.name.clone(),
                    message: e.to_string(),
                };
                let resp = client.get(url).send().await.map_err(unreachable)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(RetrievalError::Status {
                        provider: self.name.clone(),
                        status: status.as_u16(),
                    });
                }
                resp.text().await.map_err(unreachable)
            }
        }
    }

    /// Linked article page. Failures only cost this one item its body.
    async fn fetch_page(&self, page_url: &str) -> Option<String> {
        match &self.mode {
            Mode::Fixture { pages, .. } => pages.get(page_url).cloned(),
            Mode::Http { client, .. } => {
                let resp = match client.get(page_url).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(provider = %self.name, url = page_url, error = %e, "page fetch failed");
                        return None;
                    }
                };
                if !resp.status().is_success() {
                    tracing::warn!(provider = %self.name, url = page_url, status = resp.status().as_u16(), "page fetch failed");
                    return None;
                }
                resp.text().await.ok()
            }
        }
    }

    /// Items whose feed entry carried no text get the text of their linked page.
    async fn fill_from_pages(&self, articles: &mut [SourceArticle]) {
        for a in articles.iter_mut() {
            if !a.raw_text.trim().is_empty() || !a.url.starts_with("http") {
                continue;
            }
            if let Some(html) = self.fetch_page(&a.url).await {
                a.raw_text = extract_page_text(&html);
                tracing::debug!(
                    provider = %self.name,
                    url = %a.url,
                    chars = a.raw_text.chars().count(),
                    "body taken from linked page"
                );
                counter!("ingest_page_fallback_total").increment(1);
            }
        }
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<SourceArticle>, RetrievalError> {
        let xml = self.fetch_feed().await?;
        let mut articles = self.parse_feed(&xml)?;
        self.fill_from_pages(&mut articles).await;
        Ok(articles)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }
}

/// HTML entities that are not valid XML and show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_dates_parse_and_garbage_is_zero() {
        assert_eq!(
            parse_rfc2822_to_unix("Tue, 10 Jun 2025 12:00:00 +0000"),
            1_749_556_800
        );
        assert_eq!(parse_rfc2822_to_unix("yesterday"), 0);
    }

    #[test]
    fn page_text_prefers_article_and_drops_chrome() {
        let html = r#"<html><head><style>p{}</style></head><body>
<header>Site menu</header><nav>Home</nav>
<article><h1>Headline</h1><p>First para.</p><script>track()</script><p>Second para.</p></article>
<footer>Copyright</footer></body></html>"#;
        assert_eq!(extract_page_text(html), "Headline\n\nFirst para.\n\nSecond para.");

        let no_article = "<body><div>Cookie bar</div><main><p>Main text.</p></main></body>";
        assert_eq!(extract_page_text(no_article), "Main text.");
        assert_eq!(extract_page_text("<body><p>Only body.</p></body>"), "Only body.");
    }

    #[test]
    fn prefers_encoded_content_and_respects_limit() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>T</title>
    <item>
      <title>First&nbsp;post</title>
      <link>https://feed.test/1</link>
      <description>Short teaser</description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
    </item>
    <item>
      <title>Second</title>
      <link>https://feed.test/2</link>
      <description>Only teaser</description>
    </item>
  </channel>
</rss>"#;
        let src = FeedSource::new("Test", "https://feed.test/rss", 1);
        let p = RssProvider::from_fixture(&src, xml);
        let items = p.parse_feed(xml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First post");
        assert_eq!(items[0].raw_text, "Full body");
        assert_eq!(items[0].summary, "Short teaser");
        assert_eq!(items[1].raw_text, "Only teaser");

        let limited = RssProvider::from_fixture(&src, xml).with_limit(1);
        assert_eq!(limited.parse_feed(xml).unwrap().len(), 1);
    }
}
