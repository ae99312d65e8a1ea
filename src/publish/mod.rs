// src/publish/mod.rs
//! Writes locale variants into the site generator's content tree.
//!
//! New posts go to a path that is a function of (locale, slug) only, and files
//! are created with create-new semantics: an existing file is never
//! overwritten. A (locale, slug) pair already present anywhere in the tree,
//! including date-prefixed directories written by older tooling, counts as
//! published.

pub mod front_matter;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::PublishError;
use crate::locale::Locale;
use crate::transform::SlugRegistry;
use crate::translate::LocalizedPost;

/// Per-locale blog directory name used by the site generator's i18n layout.
pub const BLOG_PLUGIN_DIR: &str = "docusaurus-plugin-content-blog";
pub const INDEX_FILE: &str = "index.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    pub blog_dir: PathBuf,
    pub i18n_dir: PathBuf,
}

impl ContentLayout {
    pub fn new(blog_dir: impl Into<PathBuf>, i18n_dir: impl Into<PathBuf>) -> Self {
        Self {
            blog_dir: blog_dir.into(),
            i18n_dir: i18n_dir.into(),
        }
    }

    /// Directory holding every post of `locale`.
    pub fn locale_root(&self, locale: Locale) -> PathBuf {
        if locale.is_source() {
            self.blog_dir.clone()
        } else {
            self.i18n_dir.join(locale.code()).join(BLOG_PLUGIN_DIR)
        }
    }

    pub fn post_path(&self, locale: Locale, slug: &str) -> PathBuf {
        self.locale_root(locale).join(slug).join(INDEX_FILE)
    }
}

#[derive(Debug, Default)]
pub struct PublishReport {
    pub written: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub written_paths: Vec<PathBuf>,
    pub errors: Vec<PublishError>,
}

enum WriteOutcome {
    Written(PathBuf),
    Duplicate(PathBuf),
}

pub struct Publisher {
    layout: ContentLayout,
    date: NaiveDate,
    dry_run: bool,
    /// Posts found by [`Publisher::scan_published`], keyed by (locale, slug).
    known: HashMap<(Locale, String), PathBuf>,
}

impl Publisher {
    pub fn new(layout: ContentLayout) -> Self {
        Self {
            layout,
            date: chrono::Local::now().date_naive(),
            dry_run: false,
            known: HashMap::new(),
        }
    }

    /// Date written into front-matter.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Report what would be written without touching disk.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Where (locale, slug) is already published, if anywhere.
    pub fn published_path(&self, locale: Locale, slug: &str) -> Option<PathBuf> {
        if let Some(path) = self.known.get(&(locale, slug.to_string())) {
            return Some(path.clone());
        }
        let path = self.layout.post_path(locale, slug);
        path.exists().then_some(path)
    }

    pub fn exists(&self, locale: Locale, slug: &str) -> bool {
        self.published_path(locale, slug).is_some()
    }

    /// Write every post; a failure on one file does not stop the others.
    pub fn publish(&self, posts: &[LocalizedPost]) -> PublishReport {
        let mut report = PublishReport::default();
        for post in posts {
            match self.write_one(post) {
                Ok(WriteOutcome::Written(path)) => {
                    tracing::info!(
                        slug = %post.slug,
                        locale = %post.locale,
                        path = %path.display(),
                        dry_run = self.dry_run,
                        "published"
                    );
                    report.written += 1;
                    report.written_paths.push(path);
                }
                Ok(WriteOutcome::Duplicate(existing)) => {
                    tracing::debug!(
                        slug = %post.slug,
                        locale = %post.locale,
                        path = %existing.display(),
                        "already published"
                    );
                    report.skipped_duplicate += 1;
                }
                Err(e) => {
                    tracing::error!(slug = %post.slug, locale = %post.locale, error = %e, "publish failed");
                    report.failed += 1;
                    report.errors.push(e);
                }
            }
        }
        report
    }

    fn write_one(&self, post: &LocalizedPost) -> Result<WriteOutcome, PublishError> {
        if let Some(existing) = self.published_path(post.locale, &post.slug) {
            return Ok(WriteOutcome::Duplicate(existing));
        }
        let path = self.layout.post_path(post.locale, &post.slug);
        let text = front_matter::render(post, self.date)?;
        if self.dry_run {
            return Ok(WriteOutcome::Written(path));
        }

        let io_err = |p: &Path, source: io::Error| PublishError::Io {
            path: p.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(WriteOutcome::Duplicate(path))
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        if let Err(e) = file.write_all(text.as_bytes()).and_then(|_| file.sync_all()) {
            // A half-written file would count as published on the next run.
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(io_err(&path, e));
        }
        Ok(WriteOutcome::Written(path))
    }

    /// Collect slugs (and their source URLs) already present in any locale tree.
    ///
    /// Reads `<dir>/index.md` directories and loose `.md`/`.mdx` files. Posts
    /// without a `slug` key are registered under their directory or file name.
    /// Every post found is remembered so later writes treat its (locale, slug)
    /// as taken, wherever the file lives.
    pub fn scan_published(&mut self, locales: &[Locale]) -> SlugRegistry {
        let mut registry = SlugRegistry::new();
        for &locale in locales {
            let root = self.layout.locale_root(locale);
            let entries = match fs::read_dir(&root) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "no published tree");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let (file, fallback) = if path.is_dir() {
                    (path.join(INDEX_FILE), file_name(&path))
                } else if matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("md") | Some("mdx")
                ) {
                    (path.clone(), file_stem(&path))
                } else {
                    continue;
                };
                let Ok(text) = fs::read_to_string(&file) else {
                    continue;
                };
                let (slug, source_url) = slug_and_source(&text);
                let Some(slug) = slug.or(fallback) else {
                    continue;
                };
                self.known.entry((locale, slug.clone())).or_insert(file);
                registry.insert(slug, source_url);
            }
        }
        tracing::debug!(
            slugs = registry.len(),
            files = self.known.len(),
            "scanned published posts"
        );
        registry
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|s| s.to_str()).map(str::to_string)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

/// Lenient read of hand-written posts that may lack our keys.
fn slug_and_source(text: &str) -> (Option<String>, String) {
    #[derive(Deserialize)]
    struct Loose {
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        source_url: Option<String>,
    }
    let Some((yaml, _)) = front_matter::split(text) else {
        return (None, String::new());
    };
    match serde_yaml_ng::from_str::<Loose>(yaml) {
        Ok(l) => (
            l.slug.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            l.source_url.unwrap_or_default(),
        ),
        Err(_) => (None, String::new()),
    }
}
