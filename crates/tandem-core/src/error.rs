//! Error types for Tandem.
//!
//! Propagation policy: the ingestion pipeline and the search orchestrator
//! recover backend failures locally (empty results / `ProcessingStats.errors`).
//! Only lifecycle calls (`connect`, `initialize`) surface fatal errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
