//! Batch download: fetch many files, bundle them or save them one by one.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::report::{DownloadMode, DownloadReport, DownloadReportBuilder, FailedEntry, SavedArchive};
use crate::sink::{DirectorySink, SaveSink};

const DUPLICATE_ENTRY: &str = "duplicate archive entry name";

/// One file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// Fetchable, possibly expired, locator.
    pub url: String,
    /// Folder-qualified name (`"{folder}/{key}"`).
    pub archive_entry_name: String,
    pub size_bytes: u64,
}

/// The files selected at the moment a download was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadBatch {
    /// Unique batch identifier.
    pub id: String,
    pub entries: Vec<BatchEntry>,
}

impl DownloadBatch {
    /// Creates a batch with a fresh identifier.
    #[must_use]
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entries,
        }
    }

    /// Returns the aggregate size of the batch in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.entries
            .iter()
            .fold(0_u64, |total, e| total.saturating_add(e.size_bytes))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Retrieves the bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` completely.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// [`Fetcher`] over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Trait for receiving batch progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress: Send + Sync {
    /// Called once the batch passed its checks and is about to start.
    fn on_batch_start(&self, _batch: &DownloadBatch, _mode: DownloadMode) {}

    /// Called when an entry starts fetching (archive) or is triggered (direct).
    fn on_file_start(&self, _name: &str, _size: u64) {}

    /// Called when an entry has been fetched or triggered.
    fn on_file_complete(&self, _name: &str, _bytes: u64) {}

    /// Called when an entry fails.
    fn on_error(&self, _name: &str, _error: &str) {}

    /// Called after the archive has been saved.
    fn on_archive_saved(&self, _archive: &SavedArchive) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Runs download batches against a fetcher and a save sink.
pub struct BatchDownloader<F: Fetcher = HttpFetcher, S: SaveSink = DirectorySink> {
    fetcher: F,
    sink: S,
    config: DownloadConfig,
}

impl BatchDownloader<HttpFetcher, DirectorySink> {
    /// Creates a downloader over HTTP saving into `config.output_dir`.
    #[must_use]
    pub fn new(config: DownloadConfig) -> Self {
        let fetcher = HttpFetcher::new();
        let sink = DirectorySink::new(config.output_dir.clone(), Arc::new(fetcher.clone()));
        Self {
            fetcher,
            sink,
            config,
        }
    }
}

impl<F: Fetcher, S: SaveSink> BatchDownloader<F, S> {
    /// Creates a downloader from custom parts.
    #[must_use]
    pub const fn with_parts(fetcher: F, sink: S, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            sink,
            config,
        }
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Refuses batches that are empty or larger than the configured cap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBatch`] or [`Error::Oversize`].
    pub fn check(&self, batch: &DownloadBatch) -> Result<()> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let total = batch.total_size();
        if total > self.config.max_batch_bytes {
            log::warn!(
                "Refusing batch {}: {total} bytes exceeds the {} byte limit",
                batch.id,
                self.config.max_batch_bytes
            );
            return Err(Error::Oversize {
                total,
                limit: self.config.max_batch_bytes,
            });
        }
        Ok(())
    }

    /// Runs a batch in the given mode.
    ///
    /// Per-entry failures are recorded in the report and never abort the
    /// batch. Nothing is fetched if the batch fails its checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBatch`] or [`Error::Oversize`] before any
    /// network activity, [`Error::AllFailed`] if no archive entry could be
    /// fetched, and archive or sink errors if the archive cannot be saved.
    pub async fn download(
        &self,
        batch: &DownloadBatch,
        mode: DownloadMode,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<DownloadReport> {
        self.check(batch)?;
        log::info!(
            "Starting {mode:?} batch {} with {} file(s), {} bytes",
            batch.id,
            batch.len(),
            batch.total_size()
        );
        progress.on_batch_start(batch, mode);

        let report = match mode {
            DownloadMode::Archive => self.download_archive(batch, progress).await?,
            DownloadMode::Direct => self.download_direct(batch, progress).await,
        };
        log::info!(
            "Batch {} finished: {} succeeded, {} failed",
            report.batch_id,
            report.succeeded,
            report.failed
        );
        Ok(report)
    }

    async fn download_archive(
        &self,
        batch: &DownloadBatch,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<DownloadReport> {
        let mut builder = DownloadReportBuilder::new(&batch.id, DownloadMode::Archive, batch.len());

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(batch.len());
        for entry in &batch.entries {
            if seen.insert(entry.archive_entry_name.as_str()) {
                unique.push(entry.clone());
            } else {
                log::warn!("Skipping duplicate archive entry {}", entry.archive_entry_name);
                progress.on_error(&entry.archive_entry_name, DUPLICATE_ENTRY);
                builder.add_failure(FailedEntry {
                    archive_entry_name: entry.archive_entry_name.clone(),
                    url: entry.url.clone(),
                    error: DUPLICATE_ENTRY.to_string(),
                });
            }
        }

        let fetcher = &self.fetcher;
        let mut results: Vec<_> = stream::iter(unique.into_iter().enumerate())
            .map(|(index, entry)| async move {
                progress.on_file_start(&entry.archive_entry_name, entry.size_bytes);
                let result = fetcher.fetch(&entry.url).await;
                (index, entry, result)
            })
            .buffer_unordered(self.config.concurrent_fetches.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut fetched = Vec::with_capacity(results.len());
        for (_, entry, result) in results {
            match result {
                Ok(data) => {
                    progress.on_file_complete(&entry.archive_entry_name, data.len() as u64);
                    builder.add_success(data.len() as u64);
                    fetched.push((entry.archive_entry_name, data));
                }
                Err(e) => {
                    log::error!("Fetching {} failed: {e}", entry.archive_entry_name);
                    progress.on_error(&entry.archive_entry_name, &e.to_string());
                    builder.add_failure(FailedEntry {
                        archive_entry_name: entry.archive_entry_name,
                        url: entry.url,
                        error: e.to_string(),
                    });
                }
            }
        }

        if fetched.is_empty() {
            log::error!("Batch {}: every fetch failed, no archive saved", batch.id);
            return Err(Error::AllFailed {
                failed: builder.failed(),
            });
        }

        let entries = fetched.len();
        let archive = tokio::task::spawn_blocking(move || build_archive(fetched))
            .await
            .map_err(|e| Error::Archive(e.to_string()))??;
        let bytes = archive.len() as u64;
        let path = self.sink.save_blob(&self.archive_file_name(batch), archive).await?;

        let saved = SavedArchive {
            path,
            entries,
            bytes,
        };
        progress.on_archive_saved(&saved);
        builder.set_archive(saved);
        Ok(builder.build())
    }

    async fn download_direct(
        &self,
        batch: &DownloadBatch,
        progress: &Arc<dyn DownloadProgress>,
    ) -> DownloadReport {
        let mut builder = DownloadReportBuilder::new(&batch.id, DownloadMode::Direct, batch.len());
        let stagger = self.config.direct_stagger();

        for (index, entry) in batch.entries.iter().enumerate() {
            if index > 0 && !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
            }
            progress.on_file_start(&entry.archive_entry_name, entry.size_bytes);
            match self
                .sink
                .trigger_direct(&entry.archive_entry_name, &entry.url)
                .await
            {
                Ok(()) => {
                    progress.on_file_complete(&entry.archive_entry_name, 0);
                    builder.add_success(0);
                }
                Err(e) => {
                    log::error!("Could not start {}: {e}", entry.archive_entry_name);
                    progress.on_error(&entry.archive_entry_name, &e.to_string());
                    builder.add_failure(FailedEntry {
                        archive_entry_name: entry.archive_entry_name.clone(),
                        url: entry.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        builder.build()
    }

    /// Synthesized archive name, e.g. `selected_files_20260101-120000_1a2b3c4d.zip`.
    ///
    /// The batch id suffix keeps archives of the same second apart.
    fn archive_file_name(&self, batch: &DownloadBatch) -> String {
        let short_id: String = batch.id.chars().filter(char::is_ascii_hexdigit).take(8).collect();
        format!(
            "{}_{}_{short_id}.zip",
            self.config.archive_name,
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        )
    }
}

/// Serializes fetched entries into one zip archive, in the given order.
///
/// A repeated entry name keeps its first occurrence.
fn build_archive(entries: Vec<(String, Bytes)>) -> Result<Bytes> {
    let archive_err = |e: zip::result::ZipError| Error::Archive(e.to_string());
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(entries.iter().any(|(_, data)| data.len() >= u32::MAX as usize));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = HashSet::new();
    for (name, data) in entries {
        if !names.insert(name.clone()) {
            log::warn!("Skipping duplicate archive entry {name}");
            continue;
        }
        writer.start_file(name, options).map_err(archive_err)?;
        writer.write_all(&data)?;
    }
    let cursor = writer.finish().map_err(archive_err)?;
    Ok(Bytes::from(cursor.into_inner()))
}
