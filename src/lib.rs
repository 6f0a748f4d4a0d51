//! airflow-catalog - browse, filter and download an airflow simulation catalog.
//!
//! The catalog joins a metadata index (one record per simulation case) with a
//! storage listing (folders of files with pre-signed URLs). A
//! [`CatalogSession`] filters cases, tracks per-file selections and turns the
//! selection into a [`DownloadBatch`] that a [`BatchDownloader`] bundles into a
//! zip archive or saves file by file.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use airflow_catalog::{
//!     BatchDownloader, CaseId, Dimension, DownloadConfig, DownloadMode, DownloadProgress,
//!     HttpListing, HttpMetadata, ListingSource, NoProgress, load_session,
//! };
//!
//! # async fn example() -> airflow_catalog::Result<()> {
//! let metadata = HttpMetadata::new("https://example.org/metadata.json");
//! let listing = HttpListing::new("https://example.org/list");
//!
//! // Join the index with the listing below "cases/"
//! let listing = Some(&listing as &dyn ListingSource);
//! let mut session = load_session(&metadata, listing, "cases/").await?;
//!
//! // Narrow to one country and select a whole case
//! session.toggle_filter_value(Dimension::Country, "UK");
//! session.toggle_case(&CaseId::from("caseA"));
//!
//! let downloader = BatchDownloader::new(DownloadConfig::default());
//! let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);
//! let report = downloader
//!     .download(&session.download_batch(), DownloadMode::Archive, &progress)
//!     .await?;
//! println!("{}", report.status_text());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod filter;
pub mod format;
pub mod listing;
pub mod metadata;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod selection;
pub mod session;
pub mod sink;

#[cfg(feature = "server")]
pub mod api;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use catalog::{CaseFile, CatalogNode, FileEntry, RawFolder, RawObject, build_tree};
pub use config::{AdminConfig, ApiConfig, AppConfig, DownloadConfig, SourcesConfig};
pub use download::{
    BatchDownloader, BatchEntry, DownloadBatch, DownloadProgress, Fetcher, HttpFetcher,
    NoProgress,
};
pub use error::{Error, Result};
pub use filter::{ALL_SENTINEL, Dimension, FilterCriteria};
pub use format::{format_bytes, format_duration, format_megabytes, format_size_vs_limit};
pub use listing::{HttpListing, ListingSource};
pub use metadata::{HttpMetadata, JsonFileStore, MetadataSource, MetadataStore};
pub use reconcile::{ReconcileOutcome, reconcile};
pub use record::{CaseId, CaseRecord, ParsedIndex, Quarantined, parse_index};
pub use report::{DownloadMode, DownloadReport, FailedEntry, SavedArchive, error_status_text};
pub use selection::{SelectionState, TriState};
pub use session::{
    CatalogSession, CatalogSnapshot, CatalogView, SessionAction, fetch_snapshot, load_session,
};
pub use sink::{DirectorySink, SaveSink};
