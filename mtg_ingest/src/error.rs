//! Error types for mtg_ingest

use crate::source::SourceError;
use crate::store::WriteError;
use thiserror::Error;

/// Unified error type for mtg_ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    /// A source file could not be opened or had the wrong shape
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    /// A write run could not start, commit a batch or finish
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Failed to write CSV output
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Some input files could not be read
    #[error("{failed} of {total} input files failed")]
    FilesFailed { failed: usize, total: usize },
    /// Invalid option value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Legacy alias for backwards compatibility
pub type Error = IngestError;

/// Result alias for mtg_ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;
