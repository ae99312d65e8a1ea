// src/ingest/providers/json_file.rs
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::ingest::types::{article_id, SourceArticle, SourceProvider};

/// Reads a JSON array of articles, e.g. a batch saved by an earlier collect run.
pub struct JsonFileProvider {
    path: PathBuf,
    name: String,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input")
            .to_string();
        Self { path, name }
    }
}

#[async_trait]
impl SourceProvider for JsonFileProvider {
    async fn fetch_latest(&self) -> Result<Vec<SourceArticle>, RetrievalError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RetrievalError::Unreachable {
                provider: self.name.clone(),
                message: format!("{}: {e}", self.path.display()),
            }
        })?;
        let mut articles: Vec<SourceArticle> =
            serde_json::from_str(&content).map_err(|e| RetrievalError::Malformed {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;
        for a in &mut articles {
            if a.id.trim().is_empty() {
                a.id = article_id(&a.url, &a.title);
            }
            if a.source_name.trim().is_empty() {
                a.source_name = self.name.clone();
            }
        }
        Ok(articles)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
