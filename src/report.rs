//! Batch download outcome accounting and user-facing status text.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::format::{format_bytes, format_megabytes};

/// How a batch is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Each file is saved on its own.
    Direct,
    /// Every file is fetched and bundled into one zip archive.
    #[default]
    Archive,
}

impl std::str::FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "archive" | "zip" => Ok(Self::Archive),
            other => Err(format!("unknown download mode: {other}")),
        }
    }
}

/// An entry that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub archive_entry_name: String,
    pub url: String,
    pub error: String,
}

/// The archive written by an archive-mode batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedArchive {
    /// Where the archive was saved.
    pub path: PathBuf,
    /// Number of entries in the archive.
    pub entries: usize,
    /// Size of the serialized archive in bytes.
    pub bytes: u64,
}

/// Outcome of one batch download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    /// Identifier of the batch this report belongs to.
    pub batch_id: String,
    pub mode: DownloadMode,
    /// Number of entries in the batch.
    pub requested: usize,
    /// Entries fetched (archive) or triggered (direct).
    pub succeeded: usize,
    /// Entries that failed.
    pub failed: usize,
    /// Payload bytes fetched in archive mode.
    pub bytes_fetched: u64,
    pub failures: Vec<FailedEntry>,
    pub archive: Option<SavedArchive>,
    /// Total elapsed time for the batch.
    pub elapsed: Duration,
}

impl DownloadReport {
    /// Returns true if every entry succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }

    /// Toast-style summary of the outcome.
    #[must_use]
    pub fn status_text(&self) -> String {
        match (self.mode, self.failed) {
            (DownloadMode::Direct, 0) => format!("Started {} download(s)", self.succeeded),
            (DownloadMode::Direct, failed) => {
                format!("{failed} of {} download(s) could not be started", self.requested)
            }
            (DownloadMode::Archive, 0) => format!(
                "Downloaded {} file(s) ({})",
                self.succeeded,
                format_bytes(self.bytes_fetched)
            ),
            (DownloadMode::Archive, failed) => format!(
                "Downloaded {} file(s), {failed} of {} failed",
                self.succeeded, self.requested
            ),
        }
    }
}

/// Status shown while a batch is being prepared.
#[must_use]
pub fn preparing_text(count: usize, bytes: u64) -> String {
    format!("Preparing {count} file(s) ({})", format_bytes(bytes))
}

/// Status shown when a download is refused or fails as a whole.
#[must_use]
pub fn error_status_text(error: &Error) -> String {
    match error {
        Error::EmptyBatch => "No files selected".to_string(),
        Error::Oversize { total, limit } => format!(
            "Please download less than {} at a time (selected {})",
            format_megabytes(*limit),
            format_megabytes(*total)
        ),
        Error::AllFailed { .. } => "Download failed".to_string(),
        other => format!("Download failed: {other}"),
    }
}

/// Builder for accumulating a report while a batch runs.
pub struct DownloadReportBuilder {
    batch_id: String,
    mode: DownloadMode,
    requested: usize,
    succeeded: usize,
    bytes_fetched: u64,
    failures: Vec<FailedEntry>,
    archive: Option<SavedArchive>,
    start_time: Instant,
}

impl DownloadReportBuilder {
    /// Creates a builder for a batch of `requested` entries.
    #[must_use]
    pub fn new(batch_id: impl Into<String>, mode: DownloadMode, requested: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            mode,
            requested,
            succeeded: 0,
            bytes_fetched: 0,
            failures: Vec::new(),
            archive: None,
            start_time: Instant::now(),
        }
    }

    /// Records a successful entry.
    pub const fn add_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.bytes_fetched = self.bytes_fetched.saturating_add(bytes);
    }

    /// Records a failed entry.
    pub fn add_failure(&mut self, failure: FailedEntry) {
        self.failures.push(failure);
    }

    /// Records the saved archive.
    pub fn set_archive(&mut self, archive: SavedArchive) {
        self.archive = Some(archive);
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Builds the final report.
    #[must_use]
    pub fn build(self) -> DownloadReport {
        DownloadReport {
            batch_id: self.batch_id,
            mode: self.mode,
            requested: self.requested,
            succeeded: self.succeeded,
            failed: self.failures.len(),
            bytes_fetched: self.bytes_fetched,
            failures: self.failures,
            archive: self.archive,
            elapsed: self.start_time.elapsed(),
        }
    }
}
