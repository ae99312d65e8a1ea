// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod locale;
pub mod pipeline;
pub mod publish;
pub mod telemetry;
pub mod transform;
pub mod translate;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::error::{ConfigError, PublishError, RetrievalError, TransformError, TranslationError};
pub use crate::ingest::types::{SourceArticle, SourceProvider};
pub use crate::locale::Locale;
pub use crate::pipeline::{ItemReport, ItemState, Pipeline, RunSummary};
