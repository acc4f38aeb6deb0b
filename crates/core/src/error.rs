use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard, run-aborting failures. Everything that happens per file is
/// absorbed into statistics instead (see [`FileError`]).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(String),

    #[error("worker process error: {0}")]
    Worker(String),
}

/// Per-file failure taxonomy. Carried across the process-pool boundary,
/// hence string payloads only.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FileError {
    #[error("metadata extraction failed: {0}")]
    Metadata(String),

    #[error("no text could be extracted: {0}")]
    EmptyText(String),

    #[error("pdf extraction failed: {0}")]
    PdfExtraction(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
