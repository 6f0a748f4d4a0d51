//! Hierarchical folder/file catalog mirrored from object storage.
//!
//! The listing collaborator returns a recursive folder shape. [`build_tree`]
//! normalizes it into [`CatalogNode`]s; traversal (lookup by folder name,
//! walking files with case-relative keys) is defined here once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A downloadable file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name, unique within its folder.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Fetchable, possibly short-lived, resource locator.
    pub url: String,
}

impl FileEntry {
    /// Creates a new file entry.
    #[must_use]
    pub fn new(name: impl Into<String>, size_bytes: u64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            url: url.into(),
        }
    }

    /// Returns the lowercase extension including the dot (e.g. `".nc"`).
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// A folder with its files and nested folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogNode {
    /// Path-like folder name as reported by storage.
    pub name: String,
    /// Files directly inside this folder.
    pub files: Vec<FileEntry>,
    /// Nested folders.
    pub subfolders: Vec<CatalogNode>,
}

/// File as seen from a case: its key relative to the case folder plus the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFile<'a> {
    /// Path relative to the case node (`"x.nc"` or `"sub/x.nc"`).
    pub key: String,
    /// The underlying file entry.
    pub file: &'a FileEntry,
}

/// Raw object as returned by the listing collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawObject {
    /// Object key relative to the folder prefix.
    #[serde(default)]
    pub name: String,
    /// Object size in bytes.
    #[serde(default, alias = "sizeBytes", alias = "size_bytes")]
    pub size: Option<u64>,
    /// Pre-signed URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Raw folder as returned by the listing collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFolder {
    /// Folder prefix.
    #[serde(default)]
    pub name: String,
    /// Objects directly under the prefix.
    #[serde(default)]
    pub files: Vec<RawObject>,
    /// Common prefixes below this one.
    #[serde(default)]
    pub subfolders: Vec<RawFolder>,
}

/// Parses a raw listing response into a [`CatalogNode`].
///
/// The folder's own placeholder object (empty name, or the folder name
/// itself) is dropped, as are objects without a URL. Sibling names are kept
/// unique: later duplicates are discarded with a warning.
#[must_use]
pub fn build_tree(raw: RawFolder) -> CatalogNode {
    let RawFolder {
        name,
        files,
        subfolders,
    } = raw;

    let mut seen_files = HashSet::new();
    let files = files
        .into_iter()
        .filter_map(|obj| {
            if obj.name.is_empty() || obj.name == name || obj.name.ends_with('/') {
                return None;
            }
            let Some(url) = obj.url else {
                log::debug!("Skipping {}{}: no download URL", name, obj.name);
                return None;
            };
            if !seen_files.insert(obj.name.clone()) {
                log::warn!("Duplicate file {} in {}", obj.name, name);
                return None;
            }
            Some(FileEntry {
                name: obj.name,
                size_bytes: obj.size.unwrap_or(0),
                url,
            })
        })
        .collect();

    let mut seen_folders = HashSet::new();
    let subfolders = subfolders
        .into_iter()
        .filter(|sub| {
            let fresh = seen_folders.insert(sub.name.clone());
            if !fresh {
                log::warn!("Duplicate folder {} in {}", sub.name, name);
            }
            fresh
        })
        .map(build_tree)
        .collect();

    CatalogNode {
        name,
        files,
        subfolders,
    }
}

/// Depth-first, pre-order search for a folder with exactly `target` as name.
///
/// Returns the first match, or `None` when nothing matches.
#[must_use]
pub fn find_folder<'a>(root: &'a CatalogNode, target: &str) -> Option<&'a CatalogNode> {
    if root.name == target {
        return Some(root);
    }
    root.subfolders
        .iter()
        .find_map(|sub| find_folder(sub, target))
}

impl CatalogNode {
    /// Creates an empty folder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a file (builder style).
    #[must_use]
    pub fn with_file(mut self, file: FileEntry) -> Self {
        self.files.push(file);
        self
    }

    /// Adds a subfolder (builder style).
    #[must_use]
    pub fn with_subfolder(mut self, folder: Self) -> Self {
        self.subfolders.push(folder);
        self
    }

    /// Returns the folder name without storage prefixes or trailing slash.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Walks every file in this subtree, keyed relative to this folder.
    ///
    /// Direct files come first, then each subfolder in order.
    #[must_use]
    pub fn walk_files(&self) -> Vec<CaseFile<'_>> {
        let mut out = Vec::new();
        self.walk_into("", &mut out);
        out
    }

    fn walk_into<'a>(&'a self, prefix: &str, out: &mut Vec<CaseFile<'a>>) {
        out.extend(self.files.iter().map(|file| CaseFile {
            key: format!("{prefix}{}", file.name),
            file,
        }));
        for sub in &self.subfolders {
            let segment = sub.relative_name(&self.name);
            sub.walk_into(&format!("{prefix}{segment}/"), out);
        }
    }

    /// Name of this folder relative to its parent's name.
    fn relative_name(&self, parent: &str) -> &str {
        self.name
            .strip_prefix(parent)
            .filter(|rest| !rest.is_empty())
            .unwrap_or(&self.name)
            .trim_matches('/')
    }

    /// Looks up a file by its case-relative key.
    #[must_use]
    pub fn file_at(&self, key: &str) -> Option<&FileEntry> {
        self.walk_files()
            .into_iter()
            .find_map(|entry| (entry.key == key).then_some(entry.file))
    }

    /// Total size of all files in this subtree.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        let own = self
            .files
            .iter()
            .fold(0_u64, |total, f| total.saturating_add(f.size_bytes));
        self.subfolders
            .iter()
            .fold(own, |total, sub| total.saturating_add(sub.total_size()))
    }

    /// Number of files in this subtree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len() + self.subfolders.iter().map(Self::file_count).sum::<usize>()
    }
}
