// src/error.rs
//! Error taxonomy for the pipeline stages.
//!
//! `ConfigError` aborts the run before any item is touched. Every other error
//! is scoped to one item (or one locale of one item) and is turned into an
//! item state by the pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("reading feed list {path}: {reason}")]
    Sources { path: PathBuf, reason: String },

    #[error("reading relevance rules {path}: {reason}")]
    Relevance { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("{provider}: request failed: {message}")]
    Unreachable { provider: String, message: String },

    #[error("{provider}: upstream returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("{provider}: malformed feed: {message}")]
    Malformed { provider: String, message: String },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("source article {id} has no usable content")]
    EmptyContent { id: String },

    #[error("source article {id} is too short ({chars} < {min} chars)")]
    TooShort { id: String, chars: usize, min: usize },

    #[error("content model request failed: {0}")]
    Backend(String),

    #[error("content model returned an unusable reply: {0}")]
    MalformedResponse(String),
}

impl TransformError {
    /// The source itself is unusable; retrying on a later run will not help.
    pub fn is_content_rejection(&self) -> bool {
        matches!(self, Self::EmptyContent { .. } | Self::TooShort { .. })
    }
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Http(String),

    #[error("translation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("translation backend returned no text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing front-matter for {slug}: {message}")]
    FrontMatter { slug: String, message: String },

    #[error("malformed published file: {0}")]
    Parse(String),
}
