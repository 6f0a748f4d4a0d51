//! Case records: the typed boundary over the loosely-shaped metadata index.
//!
//! The index is a JSON array whose records come in two historical shapes
//! (realistic neighbourhoods with spaced, capitalised keys and an embedded
//! file list; idealized models with camelCase keys). [`parse_index`] converts
//! both into [`CaseRecord`] and quarantines anything malformed.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{CatalogNode, FileEntry, find_folder};
use crate::error::{Error, Result};
use crate::filter::Dimension;

const BYTES_PER_MB: f64 = 1_048_576.0;

const ID_KEYS: &[&str] = &["id", "Id", "ID"];
const FOLDER_KEYS: &[&str] = &["Folder Name", "folder", "folderName"];
const NAME_KEYS: &[&str] = &["Name", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "Description", "Config"];
const COUNTRY_KEYS: &[&str] = &["Country", "country"];
const CITY_KEYS: &[&str] = &["City", "city"];
const HEIGHT_KEYS: &[&str] = &[
    "Standard Deviation of Building Height",
    "stdDevBuildingHeightRange",
    "Height",
    "height",
];
const WIND_KEYS: &[&str] = &["Wind Direction", "Wind direction", "windDirection"];
const DENSITY_KEYS: &[&str] = &["Plan Area Density", "planAreaDensity", "Density", "density"];
const ALIGNMENT_KEYS: &[&str] = &["Alignment", "alignment"];
const FILES_KEYS: &[&str] = &["Files", "files"];

/// Stable identifier of a case, used for selection tracking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Creates a case id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One downloadable simulation case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRecord {
    /// Stable identifier.
    pub id: CaseId,
    /// Display name, matched by free-text search.
    pub name: String,
    /// Storage folder name used to locate the case in the listing.
    pub folder: String,
    pub description: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Building-height distribution descriptor.
    pub height_distribution: Option<String>,
    pub wind_direction: Option<String>,
    /// Plan area density.
    pub density: Option<String>,
    pub alignment: Option<String>,
    /// `[latitude, longitude]` for map display.
    pub coordinates: Option<[f64; 2]>,
    /// Folder resolved from the storage listing, if any.
    #[serde(skip)]
    pub node: Option<CatalogNode>,
    /// File list embedded in the metadata record itself.
    #[serde(skip)]
    pub embedded: Option<CatalogNode>,
}

impl CaseRecord {
    /// Creates a bare record whose display name equals its folder.
    #[must_use]
    pub fn new(id: impl Into<CaseId>, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        Self {
            id: id.into(),
            name: folder.clone(),
            folder,
            description: None,
            country: None,
            city: None,
            height_distribution: None,
            wind_direction: None,
            density: None,
            alignment: None,
            coordinates: None,
            node: None,
            embedded: None,
        }
    }

    /// Sets a categorical value (builder style).
    #[must_use]
    pub fn with_value(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match dimension {
            Dimension::Country => self.country = value,
            Dimension::City => self.city = value,
            Dimension::HeightDistribution => self.height_distribution = value,
            Dimension::WindDirection => self.wind_direction = value,
            Dimension::Density => self.density = value,
            Dimension::Alignment => self.alignment = value,
        }
        self
    }

    /// Attaches a resolved folder (builder style).
    #[must_use]
    pub fn with_node(mut self, node: CatalogNode) -> Self {
        self.node = Some(node);
        self
    }

    /// Returns the case's value for a filter dimension.
    #[must_use]
    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Country => self.country.as_deref(),
            Dimension::City => self.city.as_deref(),
            Dimension::HeightDistribution => self.height_distribution.as_deref(),
            Dimension::WindDirection => self.wind_direction.as_deref(),
            Dimension::Density => self.density.as_deref(),
            Dimension::Alignment => self.alignment.as_deref(),
        }
    }

    /// The folder to draw files from: the listing's if resolved, else the
    /// embedded one.
    #[must_use]
    pub fn resolved_node(&self) -> Option<&CatalogNode> {
        self.node.as_ref().or(self.embedded.as_ref())
    }

    /// Folder name without trailing slash, used to qualify archive entries.
    #[must_use]
    pub fn archive_prefix(&self) -> &str {
        self.folder.trim_end_matches('/')
    }
}

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quarantined {
    /// Position of the record in the index array.
    pub position: usize,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of parsing the metadata index.
#[derive(Debug, Clone, Default)]
pub struct ParsedIndex {
    /// Valid records, in index order.
    pub cases: Vec<CaseRecord>,
    /// Rejected records.
    pub quarantined: Vec<Quarantined>,
}

/// Parses the metadata index.
///
/// Accepts a bare array or an object with an `items` array. Malformed
/// records and duplicate ids are quarantined rather than propagated.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if the document is not an array of records.
pub fn parse_index(doc: &Value) -> Result<ParsedIndex> {
    let items = match doc {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Metadata("index object has no items array".to_string()))?,
        _ => return Err(Error::Metadata("index is not an array".to_string())),
    };

    let mut parsed = ParsedIndex::default();
    let mut ids = HashSet::new();
    for (position, item) in items.iter().enumerate() {
        match parse_record(item) {
            Ok(record) if !ids.insert(record.id.clone()) => {
                let reason = format!("duplicate id {}", record.id);
                log::warn!("Quarantined record {position}: {reason}");
                parsed.quarantined.push(Quarantined { position, reason });
            }
            Ok(record) => parsed.cases.push(record),
            Err(e) => {
                log::warn!("Quarantined record {position}: {e}");
                parsed.quarantined.push(Quarantined {
                    position,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}

/// Converts one raw JSON record into a [`CaseRecord`].
///
/// # Errors
///
/// Returns [`Error::InvalidRecord`] when the record is not an object, lacks
/// a folder or name, or carries values of the wrong type.
pub fn parse_record(item: &Value) -> Result<CaseRecord> {
    let obj = item
        .as_object()
        .ok_or_else(|| Error::InvalidRecord("record is not an object".to_string()))?;

    let folder = text(obj, FOLDER_KEYS)?;
    let name = text(obj, NAME_KEYS)?;
    let folder = folder
        .or_else(|| name.clone())
        .ok_or_else(|| Error::InvalidRecord("record has no folder or name".to_string()))?;
    let id = text(obj, ID_KEYS)?.unwrap_or_else(|| folder.clone());

    let embedded = match lookup(obj, FILES_KEYS) {
        None | Some(Value::Null) => None,
        Some(Value::Array(files)) => Some(embedded_node(&folder, files)?),
        Some(_) => return Err(Error::InvalidRecord("Files is not an array".to_string())),
    };

    Ok(CaseRecord {
        id: CaseId(id),
        name: name.unwrap_or_else(|| folder.clone()),
        description: text(obj, DESCRIPTION_KEYS)?,
        country: text(obj, COUNTRY_KEYS)?,
        city: text(obj, CITY_KEYS)?,
        height_distribution: text(obj, HEIGHT_KEYS)?,
        wind_direction: text(obj, WIND_KEYS)?,
        density: text(obj, DENSITY_KEYS)?,
        alignment: text(obj, ALIGNMENT_KEYS)?,
        coordinates: coordinates(obj),
        folder,
        node: None,
        embedded,
    })
}

/// Attaches listing folders to cases by folder-name equality.
///
/// A folder named `x` also matches a listing prefix `x/`. Cases with no
/// matching folder lose any previously attached listing node. Returns the
/// number of cases resolved.
pub fn attach_listing(cases: &mut [CaseRecord], root: &CatalogNode) -> usize {
    let mut resolved = 0;
    for case in cases.iter_mut() {
        let found = find_folder(root, &case.folder)
            .or_else(|| find_folder(root, &format!("{}/", case.folder)));
        if found.is_some() {
            resolved += 1;
        } else {
            log::debug!("No storage folder for case {} ({})", case.id, case.folder);
        }
        case.node = found.cloned();
    }
    resolved
}

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Reads a scalar field as text; numbers are rendered, empty strings are absent.
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>> {
    match lookup(obj, keys) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(Error::InvalidRecord(format!(
            "expected text for {}, got {other}",
            keys[0]
        ))),
    }
}

fn coordinates(obj: &Map<String, Value>) -> Option<[f64; 2]> {
    let pair = obj.get("coordinates")?.as_array()?;
    match pair.as_slice() {
        [lat, lon] => Some([lat.as_f64()?, lon.as_f64()?]),
        _ => None,
    }
}

fn embedded_node(folder: &str, files: &[Value]) -> Result<CatalogNode> {
    let mut node = CatalogNode::new(folder);
    let mut names = HashSet::new();
    for file in files {
        let obj = file
            .as_object()
            .ok_or_else(|| Error::InvalidRecord("file entry is not an object".to_string()))?;
        let name = text(obj, &["File Name", "name"])?
            .ok_or_else(|| Error::InvalidRecord("file entry has no name".to_string()))?;
        let url = text(obj, &["Direct Download Link", "url"])?
            .ok_or_else(|| Error::InvalidRecord(format!("file {name} has no link")))?;
        let size_bytes = file_size(obj, &name)?;
        if names.insert(name.clone()) {
            node.files.push(FileEntry {
                name,
                size_bytes,
                url,
            });
        } else {
            log::warn!("Duplicate embedded file {name} in {folder}");
        }
    }
    Ok(node)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn file_size(obj: &Map<String, Value>, name: &str) -> Result<u64> {
    let invalid = || Error::InvalidRecord(format!("file {name} has an invalid size"));
    if let Some(mb) = obj.get("Size (MB)") {
        let mb = match mb {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(invalid)?;
        let bytes = (mb * BYTES_PER_MB).round();
        if bytes >= u64::MAX as f64 {
            return Err(invalid());
        }
        return Ok(bytes as u64);
    }
    match lookup(obj, &["sizeBytes", "size"]) {
        None => Ok(0),
        Some(v) => v.as_u64().ok_or_else(invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_realistic_record_with_embedded_files() {
        let record = parse_record(&json!({
            "Folder Name": "CH-BAS-V1",
            "Country": "Switzerland",
            "City": "Basel",
            "Standard Deviation of Building Height": "5-10",
            "Wind Direction": 270,
            "Plan Area Density": "0.35",
            "Files": [
                {
                    "File Name": "CH-BAS-V1_d00_ped.nc",
                    "Direct Download Link": "https://s3/a",
                    "Size (MB)": 1.5
                },
                {
                    "File Name": "preview.png",
                    "Direct Download Link": "https://s3/b",
                    "Size (MB)": "0.25"
                }
            ]
        }))
        .unwrap();

        assert_eq!(record.id.as_str(), "CH-BAS-V1");
        assert_eq!(record.name, "CH-BAS-V1");
        assert_eq!(record.wind_direction.as_deref(), Some("270"));
        assert_eq!(record.value(Dimension::City), Some("Basel"));
        let node = record.resolved_node().unwrap();
        assert_eq!(node.files[0].size_bytes, 1_572_864);
        assert_eq!(node.files[1].size_bytes, 262_144);
    }

    #[test]
    fn parses_idealized_record() {
        let record = parse_record(&json!({
            "id": 7,
            "name": "Staggered dense",
            "folder": "ideal/case07/",
            "description": "staggered array",
            "alignment": "Staggered",
            "height": "Uniform",
            "density": "Dense",
            "windDirection": "North"
        }))
        .unwrap();

        assert_eq!(record.id.as_str(), "7");
        assert_eq!(record.name, "Staggered dense");
        assert_eq!(record.archive_prefix(), "ideal/case07");
        assert_eq!(record.value(Dimension::Alignment), Some("Staggered"));
        assert!(record.resolved_node().is_none());
    }

    #[test]
    fn rejects_record_without_folder_or_name() {
        let err = parse_record(&json!({ "Country": "UK" })).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn rejects_wrongly_typed_values() {
        assert!(parse_record(&json!({ "name": "x", "City": ["a"] })).is_err());
        assert!(parse_record(&json!({ "name": "x", "Files": "nope" })).is_err());
        assert!(
            parse_record(&json!({
                "name": "x",
                "Files": [{ "File Name": "a", "Direct Download Link": "u", "Size (MB)": -1 }]
            }))
            .is_err()
        );
    }

    #[test]
    fn sizes_beyond_u64_are_quarantined() {
        let doc = json!([
            {
                "Folder Name": "huge",
                "Files": [
                    { "File Name": "a.nc", "Direct Download Link": "u1", "Size (MB)": 1e300 },
                    { "File Name": "b.nc", "Direct Download Link": "u2", "Size (MB)": 1e300 }
                ]
            },
            {
                "Folder Name": "fine",
                "Files": [{ "File Name": "c.nc", "Direct Download Link": "u3", "Size (MB)": 1 }]
            }
        ]);

        let parsed = parse_index(&doc).unwrap();
        assert_eq!(parsed.cases.len(), 1);
        assert_eq!(parsed.cases[0].folder, "fine");
        assert_eq!(parsed.quarantined.len(), 1);
        assert_eq!(parsed.quarantined[0].position, 0);
    }

    #[test]
    fn parse_index_quarantines_bad_and_duplicate_records() {
        let parsed = parse_index(&json!([
            { "name": "a" },
            42,
            { "name": "b" },
            { "id": "a", "name": "dup" }
        ]))
        .unwrap();

        let ids: Vec<_> = parsed.cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let positions: Vec<_> = parsed.quarantined.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 3]);
    }

    #[test]
    fn parse_index_accepts_items_wrapper() {
        let parsed = parse_index(&json!({ "items": [{ "name": "a" }] })).unwrap();
        assert_eq!(parsed.cases.len(), 1);
        assert!(parse_index(&json!({ "rows": [] })).is_err());
        assert!(parse_index(&json!("nope")).is_err());
    }

    #[test]
    fn attach_listing_matches_with_or_without_trailing_slash() {
        let root = CatalogNode::new("")
            .with_subfolder(CatalogNode::new("caseA/").with_file(FileEntry::new("x", 1, "u")))
            .with_subfolder(CatalogNode::new("caseB").with_file(FileEntry::new("y", 2, "v")));
        let mut cases = vec![
            CaseRecord::new("a", "caseA"),
            CaseRecord::new("b", "caseB"),
            CaseRecord::new("c", "caseC"),
        ];
        cases[2].node = Some(CatalogNode::new("stale"));

        assert_eq!(attach_listing(&mut cases, &root), 2);
        assert_eq!(cases[0].node.as_ref().unwrap().name, "caseA/");
        assert_eq!(cases[1].node.as_ref().unwrap().name, "caseB");
        assert!(cases[2].node.is_none());
    }

    #[test]
    fn listing_node_takes_precedence_over_embedded() {
        let mut record = parse_record(&json!({
            "Folder Name": "caseA",
            "Files": [{ "File Name": "old", "Direct Download Link": "u", "Size (MB)": 1 }]
        }))
        .unwrap();
        record.node = Some(CatalogNode::new("caseA/").with_file(FileEntry::new("new", 1, "v")));
        assert_eq!(record.resolved_node().unwrap().files[0].name, "new");
    }

    #[test]
    fn coordinates_are_optional() {
        let record = parse_record(&json!({ "name": "a", "coordinates": [47.5, 7.6] })).unwrap();
        assert_eq!(record.coordinates, Some([47.5, 7.6]));
        let record = parse_record(&json!({ "name": "a", "coordinates": [1.0] })).unwrap();
        assert_eq!(record.coordinates, None);
    }
}
