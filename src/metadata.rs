//! The metadata index: read-only sources and the editable admin store.
//!
//! The index is one JSON array. Edits always rewrite the whole array; there
//! is no conflict detection, so concurrent editors can overwrite each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::record::{ParsedIndex, parse_index, parse_record};

const NAME_KEYS: &[&str] = &["Name", "name", "Folder Name"];

/// Supplies the parsed metadata index.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches and parses the whole index.
    async fn fetch_index(&self) -> Result<ParsedIndex>;
}

/// [`MetadataSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetadata {
    client: reqwest::Client,
    url: String,
}

impl HttpMetadata {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadata {
    async fn fetch_index(&self) -> Result<ParsedIndex> {
        log::debug!("Fetching metadata index from {}", self.url);
        let unavailable = |e: &dyn std::fmt::Display| Error::Metadata(format!("{}: {e}", self.url));

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| unavailable(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(&format!("HTTP {}", status.as_u16())));
        }
        let body = response.bytes().await.map_err(|e| unavailable(&e))?;
        let doc: Value = serde_json::from_slice(&body).map_err(|e| unavailable(&e))?;
        let parsed = parse_index(&doc)?;
        log::info!(
            "Loaded {} case(s), quarantined {}",
            parsed.cases.len(),
            parsed.quarantined.len()
        );
        Ok(parsed)
    }
}

/// Full-array CRUD over the raw index.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns every raw record.
    async fn list(&self) -> Result<Vec<Value>>;

    /// Validates and appends one record, returning the new array.
    async fn append(&self, record: Value) -> Result<Vec<Value>>;

    /// Removes every record whose name matches, returning how many were removed.
    async fn delete_by_name(&self, name: &str) -> Result<usize>;
}

/// Index kept in a local JSON file.
///
/// A missing file is an empty index. Writes go to a temporary file that is
/// renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_array(&self) -> Result<Vec<Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text)? {
            Value::Array(items) => Ok(items),
            _ => Err(Error::Metadata(format!(
                "{} does not hold a JSON array",
                self.path.display()
            ))),
        }
    }

    async fn write_array(&self, items: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(items)?;
        tokio::fs::write(&tmp_path, text).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<Value>> {
        self.read_array().await
    }

    async fn append(&self, record: Value) -> Result<Vec<Value>> {
        parse_record(&record)?;
        let mut items = self.read_array().await?;
        items.push(record);
        self.write_array(&items).await?;
        log::info!("Appended record to {} ({} total)", self.path.display(), items.len());
        Ok(items)
    }

    async fn delete_by_name(&self, name: &str) -> Result<usize> {
        let mut items = self.read_array().await?;
        let before = items.len();
        items.retain(|item| !record_has_name(item, name));
        let removed = before - items.len();
        if removed > 0 {
            self.write_array(&items).await?;
            log::info!("Deleted {removed} record(s) named {name:?}");
        }
        Ok(removed)
    }
}

#[async_trait]
impl MetadataSource for JsonFileStore {
    async fn fetch_index(&self) -> Result<ParsedIndex> {
        let items = self.read_array().await?;
        parse_index(&Value::Array(items))
    }
}

/// The configured metadata URL, or the local admin file when none is set.
#[must_use]
pub fn source_from_config(config: &AppConfig) -> Arc<dyn MetadataSource> {
    match &config.sources.metadata_url {
        Some(url) => Arc::new(HttpMetadata::new(url.clone())),
        None => Arc::new(JsonFileStore::new(config.admin.metadata_file.clone())),
    }
}

fn record_has_name(item: &Value, name: &str) -> bool {
    NAME_KEYS
        .iter()
        .any(|key| item.get(*key).and_then(Value::as_str) == Some(name))
}
