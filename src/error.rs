//! Error types for the airflow-catalog library.

use thiserror::Error;

/// Errors that can occur while loading the catalog or running a batch.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A fetch returned a non-success status code.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested resource.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// The archive could not be assembled.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The batch exceeds the configured size cap.
    #[error("Selection of {total} bytes exceeds the {limit} byte limit")]
    Oversize {
        /// Aggregate size of the batch in bytes.
        total: u64,
        /// Configured cap in bytes.
        limit: u64,
    },

    /// Download was requested with nothing selected.
    #[error("No files selected")]
    EmptyBatch,

    /// Every entry of an archive batch failed to fetch.
    #[error("Download failed: all {failed} file(s) could not be fetched")]
    AllFailed {
        /// Number of entries that failed.
        failed: usize,
    },

    /// The metadata index could not be loaded.
    #[error("Metadata unavailable: {0}")]
    Metadata(String),

    /// The storage listing could not be loaded.
    #[error("Listing unavailable: {0}")]
    Listing(String),

    /// A metadata record failed validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// A specialized `Result` type for airflow-catalog operations.
pub type Result<T> = std::result::Result<T, Error>;
