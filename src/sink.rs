//! Save targets for finished downloads.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::download::Fetcher;
use crate::error::{Error, Result};

/// Where downloads end up.
///
/// Archive mode hands over one finished blob; direct mode only triggers a
/// transfer and does not wait for it.
#[async_trait]
pub trait SaveSink: Send + Sync {
    /// Saves a complete blob under `name`, returning where it was written.
    async fn save_blob(&self, name: &str, data: Bytes) -> Result<PathBuf>;

    /// Starts a transfer of `url` to `name` without awaiting it.
    async fn trigger_direct(&self, name: &str, url: &str) -> Result<()>;
}

/// Saves into a local directory.
///
/// Writes go to `{path}.part` and are renamed into place once complete.
pub struct DirectorySink {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl DirectorySink {
    /// Creates a sink rooted at `dir`, using `fetcher` for direct transfers.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            pending: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Waits for every triggered direct transfer to finish.
    ///
    /// Returns the number of transfers awaited.
    pub async fn wait_idle(&self) -> usize {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Direct transfer task failed: {e}");
            }
        }
        count
    }

    fn target(&self, name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(relative_path(name)?))
    }
}

#[async_trait]
impl SaveSink for DirectorySink {
    async fn save_blob(&self, name: &str, data: Bytes) -> Result<PathBuf> {
        let path = self.target(name)?;
        write_atomic(&path, &data).await?;
        log::info!("Saved {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    async fn trigger_direct(&self, name: &str, url: &str) -> Result<()> {
        let path = self.target(name)?;
        let fetcher = Arc::clone(&self.fetcher);
        let url = url.to_string();
        let handle = tokio::spawn(async move {
            let result = match fetcher.fetch(&url).await {
                Ok(data) => write_atomic(&path, &data).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => log::debug!("Saved {}", path.display()),
                Err(e) => log::error!("Direct download of {} failed: {e}", path.display()),
            }
        });
        match self.pending.lock() {
            Ok(mut pending) => pending.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
        Ok(())
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".part");
    PathBuf::from(os)
}

/// Writes `data` to `{path}.part`, then renames it to `path`.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let part = part_path(path);
    if let Err(e) = tokio::fs::write(&part, data).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    tokio::fs::rename(&part, path).await?;
    Ok(())
}

/// Converts an entry name into a relative path that cannot escape the sink.
fn relative_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("refusing to save outside the output directory: {name}"),
                )));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty file name",
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct StaticFetcher(&'static [u8]);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Bytes> {
            Ok(Bytes::from_static(self.0))
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            Err(Error::Status {
                url: url.to_string(),
                status: 403,
            })
        }
    }

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("foo/bar.zip")),
            PathBuf::from("foo/bar.zip.part")
        );
    }

    #[test]
    fn relative_path_rejects_escapes() {
        assert_eq!(relative_path("caseA/x.nc").unwrap(), PathBuf::from("caseA/x.nc"));
        assert_eq!(relative_path("./x.nc").unwrap(), PathBuf::from("x.nc"));
        assert!(relative_path("../etc/passwd").is_err());
        assert!(relative_path("/etc/passwd").is_err());
        assert!(relative_path("").is_err());
    }

    #[tokio::test]
    async fn save_blob_writes_atomically() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path(), Arc::new(StaticFetcher(b"")));

        let path = sink
            .save_blob("out/selected_files.zip", Bytes::from_static(b"PK"))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("out/selected_files.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn trigger_direct_saves_in_background() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path(), Arc::new(StaticFetcher(b"netcdf")));

        sink.trigger_direct("caseA/x.nc", "https://s3/x").await.unwrap();
        assert_eq!(sink.wait_idle().await, 1);

        let saved = std::fs::read(dir.path().join("caseA/x.nc")).unwrap();
        assert_eq!(saved, b"netcdf");
        assert_eq!(sink.wait_idle().await, 0);
    }

    #[tokio::test]
    async fn failed_direct_transfer_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path(), Arc::new(FailingFetcher));

        sink.trigger_direct("x.nc", "https://s3/x").await.unwrap();
        sink.wait_idle().await;

        assert!(!dir.path().join("x.nc").exists());
        assert!(!dir.path().join("x.nc.part").exists());
    }
}
