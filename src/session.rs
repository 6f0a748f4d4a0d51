//! One user's catalog session: cases, filters and selection in one place.
//!
//! Every mutation goes through a method (or [`SessionAction`]) that leaves
//! selection and filters consistent before returning, so callers never see
//! a half-applied state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogNode;
use crate::download::{BatchEntry, DownloadBatch};
use crate::error::Result;
use crate::filter::{
    Dimension, FilterCriteria, file_type_domain, filter_cases, value_domain, visible_files,
};
use crate::format::format_megabytes;
use crate::listing::ListingSource;
use crate::metadata::MetadataSource;
use crate::reconcile::{ReconcileOutcome, reconcile};
use crate::record::{CaseId, CaseRecord, ParsedIndex, Quarantined, attach_listing};
use crate::selection::{SelectionState, TriState};

/// A user-level action on the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionAction {
    ToggleFile { case: CaseId, key: String },
    ToggleCase { case: CaseId },
    SelectAllVisible,
    ClearAll,
    ToggleFilterValue { dimension: Dimension, value: String },
    SetSearch { text: String },
    ToggleFileType { token: String },
    SetFileTypes { tokens: Vec<String> },
    ClearFilters,
}

/// Observed value domains, for rendering filter lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Domains {
    pub dimensions: BTreeMap<Dimension, Vec<String>>,
    pub file_types: Vec<String>,
}

/// A visible case row.
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    #[serde(flatten)]
    pub record: CaseRecord,
    /// Whether storage files are known for the case.
    pub resolved: bool,
    pub state: TriState,
    pub visible_files: usize,
    pub visible_bytes: u64,
    pub selected_files: usize,
}

/// A visible file row inside an expanded case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileView {
    /// Key relative to the case folder.
    pub key: String,
    pub size_bytes: u64,
    pub url: String,
    pub selected: bool,
}

/// What the UI layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub cases: Vec<CaseView>,
    pub criteria: FilterCriteria,
    pub all_visible_full: bool,
    pub selected_files: usize,
    pub total_selected_bytes: u64,
    /// Selected size in megabytes, two decimals.
    pub total_selected_text: String,
    pub quarantined: Vec<Quarantined>,
}

/// Everything fetched from the collaborators for one load or refresh.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub index: ParsedIndex,
    /// `None` when the listing could not be fetched.
    pub listing: Option<CatalogNode>,
}

/// Fetches the metadata index and, if available, the storage listing.
///
/// # Errors
///
/// Returns an error only if the metadata index cannot be loaded; a listing
/// failure is logged and leaves the snapshot without a listing.
pub async fn fetch_snapshot(
    metadata: &dyn MetadataSource,
    listing: Option<&dyn ListingSource>,
    prefix: &str,
) -> Result<CatalogSnapshot> {
    let index = metadata.fetch_index().await.inspect_err(|e| {
        log::error!("Could not load metadata index: {e}");
    })?;
    let listing = match listing {
        Some(source) => match source.list(prefix).await {
            Ok(root) => Some(root),
            Err(e) => {
                log::warn!("Listing unavailable, cases stay unresolved: {e}");
                None
            }
        },
        None => None,
    };
    Ok(CatalogSnapshot { index, listing })
}

/// Fetches a snapshot and builds a fresh session from it.
///
/// # Errors
///
/// Returns an error if the metadata index cannot be loaded.
pub async fn load_session(
    metadata: &dyn MetadataSource,
    listing: Option<&dyn ListingSource>,
    prefix: &str,
) -> Result<CatalogSession> {
    let snapshot = fetch_snapshot(metadata, listing, prefix).await?;
    Ok(CatalogSession::from_snapshot(snapshot))
}

/// Cases, filter criteria and selection for one user.
#[derive(Debug, Clone, Default)]
pub struct CatalogSession {
    cases: Vec<CaseRecord>,
    criteria: FilterCriteria,
    selection: SelectionState,
    quarantined: Vec<Quarantined>,
}

impl CatalogSession {
    /// Creates a session over already parsed cases.
    #[must_use]
    pub fn new(cases: Vec<CaseRecord>) -> Self {
        Self {
            cases,
            ..Self::default()
        }
    }

    /// Creates a session from fetched collaborator data.
    #[must_use]
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut session = Self {
            cases: snapshot.index.cases,
            quarantined: snapshot.index.quarantined,
            ..Self::default()
        };
        if let Some(root) = snapshot.listing {
            session.attach_listing(&root);
        }
        session
    }

    #[must_use]
    pub fn cases(&self) -> &[CaseRecord] {
        &self.cases
    }

    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    #[must_use]
    pub const fn selection(&self) -> &SelectionState {
        &self.selection
    }

    #[must_use]
    pub fn quarantined(&self) -> &[Quarantined] {
        &self.quarantined
    }

    #[must_use]
    pub fn case(&self, id: &CaseId) -> Option<&CaseRecord> {
        self.cases.iter().find(|c| &c.id == id)
    }

    /// Cases passing the current criteria, in catalog order.
    #[must_use]
    pub fn visible_cases(&self) -> Vec<&CaseRecord> {
        filter_cases(&self.cases, &self.criteria)
    }

    /// Keys of the files of a case that pass the file-type filter.
    #[must_use]
    pub fn visible_file_keys(&self, case: &CaseRecord) -> BTreeSet<String> {
        visible_files(case, self.criteria.file_types())
            .into_iter()
            .map(|f| f.key)
            .collect()
    }

    fn visible_keys_of(&self, id: &CaseId) -> BTreeSet<String> {
        self.case(id)
            .map(|c| self.visible_file_keys(c))
            .unwrap_or_default()
    }

    /// Visible files of every case, regardless of case-level filters.
    fn visible_map(&self) -> BTreeMap<CaseId, BTreeSet<String>> {
        self.cases
            .iter()
            .map(|c| (c.id.clone(), self.visible_file_keys(c)))
            .collect()
    }

    /// Flips one file. Returns false for unknown cases or invisible files.
    pub fn toggle_file(&mut self, id: &CaseId, key: &str) -> bool {
        let visible = self.visible_keys_of(id);
        self.selection.toggle_file(id, key, &visible)
    }

    /// Tri-state toggle of a case.
    pub fn toggle_case(&mut self, id: &CaseId) -> bool {
        let visible = self.visible_keys_of(id);
        if visible.is_empty() {
            return false;
        }
        self.selection.toggle_case(id, &visible);
        true
    }

    /// Selects every visible file of every visible case.
    pub fn select_all_visible(&mut self) {
        let visible: Vec<(CaseId, BTreeSet<String>)> = self
            .visible_cases()
            .into_iter()
            .map(|c| (c.id.clone(), self.visible_file_keys(c)))
            .collect();
        self.selection
            .select_all(visible.iter().map(|(id, keys)| (id, keys)));
    }

    pub fn clear_all(&mut self) {
        self.selection.clear_all();
    }

    /// Header checkbox state: every visible case with files is fully selected.
    #[must_use]
    pub fn all_visible_full(&self) -> bool {
        let mut with_files = self
            .visible_cases()
            .into_iter()
            .filter(|c| !self.visible_file_keys(c).is_empty())
            .peekable();
        with_files.peek().is_some() && with_files.all(|c| self.selection.is_full(&c.id))
    }

    /// Toggles a dimension value (or the "All" sentinel).
    ///
    /// Case-level filters hide rows but keep their selections.
    pub fn toggle_filter_value(&mut self, dimension: Dimension, value: &str) -> bool {
        let domain = value_domain(&self.cases, dimension, &self.criteria);
        self.criteria.toggle_value(dimension, value, &domain)
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.criteria.set_search(text);
    }

    /// Toggles a file-type token and reconciles the selection.
    pub fn toggle_file_type(&mut self, token: &str) -> bool {
        let domain = file_type_domain(&self.cases);
        let changed = self.criteria.toggle_file_type(token, &domain);
        if changed {
            self.reconcile_selection();
        }
        changed
    }

    /// Replaces the file-type tokens and reconciles the selection.
    ///
    /// Tokens outside the observed extensions are ignored.
    pub fn set_file_types<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domain = file_type_domain(&self.cases);
        let (known, unknown): (Vec<String>, Vec<String>) = tokens
            .into_iter()
            .map(Into::into)
            .partition(|t| domain.contains(t));
        if !unknown.is_empty() {
            log::debug!("Ignoring unknown file types {unknown:?}");
        }
        self.criteria.set_file_types(known);
        self.reconcile_selection();
    }

    /// Removes every restriction and reconciles the selection.
    pub fn clear_filters(&mut self) {
        self.criteria = FilterCriteria::default();
        self.reconcile_selection();
    }

    /// Applies one action, returning true if anything changed.
    pub fn apply(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::ToggleFile { case, key } => self.toggle_file(&case, &key),
            SessionAction::ToggleCase { case } => self.toggle_case(&case),
            SessionAction::SelectAllVisible => {
                self.select_all_visible();
                true
            }
            SessionAction::ClearAll => {
                self.clear_all();
                true
            }
            SessionAction::ToggleFilterValue { dimension, value } => {
                self.toggle_filter_value(dimension, &value)
            }
            SessionAction::SetSearch { text } => {
                self.set_search(text);
                true
            }
            SessionAction::ToggleFileType { token } => self.toggle_file_type(&token),
            SessionAction::SetFileTypes { tokens } => {
                self.set_file_types(tokens);
                true
            }
            SessionAction::ClearFilters => {
                self.clear_filters();
                true
            }
        }
    }

    /// Attaches a listing tree to the cases and reconciles.
    ///
    /// Returns the number of resolved cases.
    pub fn attach_listing(&mut self, root: &CatalogNode) -> usize {
        let resolved = attach_listing(&mut self.cases, root);
        log::info!("Resolved {resolved} of {} case(s) in storage", self.cases.len());
        self.after_catalog_change();
        resolved
    }

    /// Replaces the catalog with a refreshed snapshot and reconciles.
    ///
    /// Without a listing in the snapshot, cases keep the storage folders they
    /// were previously resolved to.
    pub fn refresh_from(&mut self, snapshot: CatalogSnapshot) -> ReconcileOutcome {
        let mut previous: HashMap<CaseId, CatalogNode> = self
            .cases
            .drain(..)
            .filter_map(|c| c.node.map(|n| (c.id, n)))
            .collect();
        self.cases = snapshot.index.cases;
        self.quarantined = snapshot.index.quarantined;

        match snapshot.listing {
            Some(root) => {
                attach_listing(&mut self.cases, &root);
            }
            None => {
                for case in &mut self.cases {
                    case.node = previous.remove(&case.id);
                }
            }
        }
        self.after_catalog_change()
    }

    fn after_catalog_change(&mut self) -> ReconcileOutcome {
        let domains = self.domains();
        self.criteria.prune(
            |d| domains.dimensions.get(&d).cloned().unwrap_or_default(),
            &domains.file_types,
        );
        self.reconcile_selection()
    }

    fn reconcile_selection(&mut self) -> ReconcileOutcome {
        let visible = self.visible_map();
        reconcile(&mut self.selection, &visible)
    }

    /// Current value domains.
    #[must_use]
    pub fn domains(&self) -> Domains {
        Domains {
            dimensions: Dimension::ALL
                .into_iter()
                .map(|d| (d, value_domain(&self.cases, d, &self.criteria)))
                .collect(),
            file_types: file_type_domain(&self.cases),
        }
    }

    /// Aggregate size of the selection in bytes.
    #[must_use]
    pub fn total_selected_size(&self) -> u64 {
        self.selection.total_selected_size(&self.cases)
    }

    /// Materializes the current selection, in catalog order.
    ///
    /// Cases sharing a folder yield each archive entry once.
    #[must_use]
    pub fn download_batch(&self) -> DownloadBatch {
        let mut seen = HashSet::new();
        let entries = self
            .cases
            .iter()
            .flat_map(|case| {
                let node = case.resolved_node();
                self.selection.selected_keys(&case.id).filter_map(move |key| {
                    let file = node?.file_at(key)?;
                    Some(BatchEntry {
                        url: file.url.clone(),
                        archive_entry_name: format!("{}/{key}", case.archive_prefix()),
                        size_bytes: file.size_bytes,
                    })
                })
            })
            .filter(|entry| {
                let fresh = seen.insert(entry.archive_entry_name.clone());
                if !fresh {
                    log::debug!("{} is already in the batch", entry.archive_entry_name);
                }
                fresh
            })
            .collect();
        DownloadBatch::new(entries)
    }

    /// Every visible file of one case, for a per-case download.
    #[must_use]
    pub fn case_batch(&self, id: &CaseId) -> Option<DownloadBatch> {
        let case = self.case(id)?;
        let entries = visible_files(case, self.criteria.file_types())
            .into_iter()
            .map(|f| BatchEntry {
                url: f.file.url.clone(),
                archive_entry_name: format!("{}/{}", case.archive_prefix(), f.key),
                size_bytes: f.file.size_bytes,
            })
            .collect();
        Some(DownloadBatch::new(entries))
    }

    /// Visible case rows with their selection state.
    #[must_use]
    pub fn view(&self) -> CatalogView {
        let cases = self
            .visible_cases()
            .into_iter()
            .map(|case| {
                let files = visible_files(case, self.criteria.file_types());
                let keys: BTreeSet<String> = files.iter().map(|f| f.key.clone()).collect();
                CaseView {
                    record: case.clone(),
                    resolved: case.resolved_node().is_some(),
                    state: self.selection.tri_state(&case.id, &keys),
                    visible_files: files.len(),
                    visible_bytes: files
                        .iter()
                        .fold(0_u64, |total, f| total.saturating_add(f.file.size_bytes)),
                    selected_files: self.selection.selected_keys(&case.id).count(),
                }
            })
            .collect();
        let total = self.total_selected_size();
        CatalogView {
            cases,
            criteria: self.criteria.clone(),
            all_visible_full: self.all_visible_full(),
            selected_files: self.selection.selected_count(),
            total_selected_bytes: total,
            total_selected_text: format_megabytes(total),
            quarantined: self.quarantined.clone(),
        }
    }

    /// Visible files of one case with selection flags.
    #[must_use]
    pub fn files_view(&self, id: &CaseId) -> Option<Vec<FileView>> {
        let case = self.case(id)?;
        Some(
            visible_files(case, self.criteria.file_types())
                .into_iter()
                .map(|f| FileView {
                    selected: self.selection.is_selected(id, &f.key),
                    key: f.key,
                    size_bytes: f.file.size_bytes,
                    url: f.file.url.clone(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileEntry;
    use crate::config::DownloadConfig;
    use crate::download::BatchDownloader;
    use crate::error::Error;
    use async_trait::async_trait;

    const MB: u64 = 1_048_576;

    fn node(folder: &str, files: &[(&str, u64)]) -> CatalogNode {
        files.iter().fold(CatalogNode::new(folder), |n, (name, size)| {
            n.with_file(FileEntry::new(*name, *size, format!("https://s3/{folder}/{name}")))
        })
    }

    fn scenario_a() -> CatalogSession {
        CatalogSession::new(vec![
            CaseRecord::new("caseA", "caseA")
                .with_node(node("caseA", &[("x.nc", 10 * MB), ("y.png", MB)])),
        ])
    }

    fn scenario_b() -> CatalogSession {
        CatalogSession::new(vec![
            CaseRecord::new("caseA", "caseA")
                .with_node(node("caseA", &[("a.nc", 1), ("b.png", 2)])),
            CaseRecord::new("caseB", "caseB").with_node(node("caseB", &[("c.nc", 3)])),
        ])
    }

    #[test]
    fn file_then_case_toggle_selects_everything() {
        let mut session = scenario_a();
        let a = CaseId::from("caseA");

        assert!(session.toggle_file(&a, "x.nc"));
        assert!(session.toggle_case(&a));

        assert!(session.selection().is_full(&a));
        assert_eq!(
            session.selection().selected_keys(&a).collect::<Vec<_>>(),
            vec!["x.nc", "y.png"]
        );
        assert_eq!(session.total_selected_size(), 11 * MB);
        assert_eq!(session.view().total_selected_text, "11.00 MB");
    }

    #[test]
    fn file_type_filter_reconciles_selection() {
        let mut session = scenario_b();
        session.select_all_visible();
        assert!(session.all_visible_full());

        session.set_file_types([".nc"]);

        let a = CaseId::from("caseA");
        let b = CaseId::from("caseB");
        assert_eq!(session.selection().selected_keys(&a).collect::<Vec<_>>(), vec!["a.nc"]);
        assert_eq!(session.selection().selected_keys(&b).collect::<Vec<_>>(), vec!["c.nc"]);
        assert!(session.selection().is_full(&b));

        // with every type visible again, caseA is partial: "b.png" was dropped
        session.set_file_types(Vec::<String>::new());
        let view = session.view();
        assert_eq!(view.cases[0].state, TriState::Partial);
        assert_eq!(view.cases[1].state, TriState::Full);
        assert!(!session.selection().is_full(&a));
    }

    #[test]
    fn case_level_filters_keep_selection() {
        let mut session = scenario_b();
        let a = CaseId::from("caseA");
        session.toggle_case(&a);
        session.set_search("caseB");

        assert_eq!(session.visible_cases().len(), 1);
        assert!(session.selection().is_full(&a));
        assert_eq!(session.download_batch().len(), 2);
    }

    #[test]
    fn download_batch_qualifies_names_with_folder() {
        let mut session = CatalogSession::new(vec![
            CaseRecord::new("a", "caseA/").with_node(
                node("caseA/", &[("x.nc", 1)])
                    .with_subfolder(node("caseA/fields/", &[("u.nc", 2)])),
            ),
            CaseRecord::new("b", "caseB").with_node(node("caseB", &[("x.nc", 4)])),
        ]);
        session.select_all_visible();

        let batch = session.download_batch();
        let names: Vec<_> = batch
            .entries
            .iter()
            .map(|e| e.archive_entry_name.as_str())
            .collect();
        assert_eq!(names, vec!["caseA/fields/u.nc", "caseA/x.nc", "caseB/x.nc"]);
        assert_eq!(batch.total_size(), 7);
    }

    #[test]
    fn unresolved_case_cannot_be_selected() {
        let mut session = CatalogSession::new(vec![CaseRecord::new("a", "caseA")]);
        let a = CaseId::from("a");
        assert!(!session.toggle_case(&a));
        assert!(!session.all_visible_full());
        assert_eq!(session.view().cases[0].state, TriState::None);
        assert!(!session.view().cases[0].resolved);
    }

    #[test]
    fn attaching_listing_resolves_cases() {
        let mut session = CatalogSession::new(vec![CaseRecord::new("a", "caseA")]);
        let root = CatalogNode::new("").with_subfolder(node("caseA/", &[("x.nc", 5)]));
        assert_eq!(session.attach_listing(&root), 1);
        assert!(session.toggle_case(&CaseId::from("a")));
        assert_eq!(session.total_selected_size(), 5);
    }

    #[test]
    fn refresh_drops_files_that_disappeared() {
        let mut session = scenario_b();
        session.select_all_visible();

        let index = ParsedIndex {
            cases: vec![
                CaseRecord::new("caseA", "caseA"),
                CaseRecord::new("caseB", "caseB"),
            ],
            quarantined: Vec::new(),
        };
        let listing = CatalogNode::new("")
            .with_subfolder(node("caseA", &[("a.nc", 1)]))
            .with_subfolder(node("caseB", &[("c.nc", 3)]));
        let outcome = session.refresh_from(CatalogSnapshot {
            index,
            listing: Some(listing),
        });

        assert_eq!(outcome.dropped_count(), 1);
        assert!(session.selection().is_full(&CaseId::from("caseA")));
        assert_eq!(session.total_selected_size(), 4);
    }

    #[test]
    fn refresh_without_listing_keeps_resolved_nodes() {
        let mut session = scenario_b();
        session.select_all_visible();
        let index = ParsedIndex {
            cases: vec![CaseRecord::new("caseA", "caseA")],
            quarantined: Vec::new(),
        };

        let outcome = session.refresh_from(CatalogSnapshot { index, listing: None });

        assert_eq!(outcome.dropped_count(), 1);
        assert_eq!(session.cases()[0].resolved_node().unwrap().files.len(), 2);
        assert!(session.selection().is_full(&CaseId::from("caseA")));
    }

    #[test]
    fn case_batch_covers_visible_files() {
        let mut session = scenario_b();
        session.set_file_types([".png"]);
        let batch = session.case_batch(&CaseId::from("caseA")).unwrap();
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].archive_entry_name, "caseA/b.png");
        assert!(session.case_batch(&CaseId::from("nope")).is_none());
    }

    #[test]
    fn files_view_reports_flags() {
        let mut session = scenario_a();
        let a = CaseId::from("caseA");
        session.toggle_file(&a, "y.png");
        let files = session.files_view(&a).unwrap();
        let flags: Vec<_> = files.iter().map(|f| (f.key.as_str(), f.selected)).collect();
        assert_eq!(flags, vec![("x.nc", false), ("y.png", true)]);
    }

    #[test]
    fn actions_deserialize_and_apply() {
        let mut session = scenario_a();
        let action: SessionAction =
            serde_json::from_str(r#"{"action":"toggle_case","case":"caseA"}"#).unwrap();
        assert!(session.apply(action));
        assert!(session.selection().is_full(&CaseId::from("caseA")));

        let action: SessionAction = serde_json::from_str(
            r#"{"action":"toggle_filter_value","dimension":"country","value":"Nowhere"}"#,
        )
        .unwrap();
        assert!(!session.apply(action));

        assert!(session.apply(SessionAction::ClearAll));
        assert!(session.selection().is_empty());
    }

    #[test]
    fn unknown_file_types_are_ignored() {
        let mut session = scenario_b();
        session.set_file_types([".nc", ".exe"]);
        assert_eq!(session.criteria().file_types().len(), 1);
        assert_eq!(session.domains().file_types, vec![".nc", ".png"]);
    }

    struct FixedMetadata(ParsedIndex);

    #[async_trait]
    impl MetadataSource for FixedMetadata {
        async fn fetch_index(&self) -> Result<ParsedIndex> {
            Ok(self.0.clone())
        }
    }

    struct DownMetadata;

    #[async_trait]
    impl MetadataSource for DownMetadata {
        async fn fetch_index(&self) -> Result<ParsedIndex> {
            Err(Error::Metadata("HTTP 503".to_string()))
        }
    }

    struct DownListing;

    #[async_trait]
    impl ListingSource for DownListing {
        async fn list(&self, _prefix: &str) -> Result<CatalogNode> {
            Err(Error::Listing("timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn metadata_failure_is_fatal() {
        let err = load_session(&DownMetadata, None, "").await.unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[tokio::test]
    async fn listing_failure_leaves_cases_unresolved() {
        let index = ParsedIndex {
            cases: vec![CaseRecord::new("a", "caseA")],
            quarantined: Vec::new(),
        };
        let listing = Some(&DownListing as &dyn ListingSource);
        let session = load_session(&FixedMetadata(index), listing, "")
            .await
            .unwrap();
        assert_eq!(session.cases().len(), 1);
        assert!(session.cases()[0].resolved_node().is_none());
    }

    #[test]
    fn cases_sharing_a_folder_batch_each_file_once() {
        let shared = node("shared", &[("a.nc", 1)]);
        let mut session = CatalogSession::new(vec![
            CaseRecord::new("one", "shared").with_node(shared.clone()),
            CaseRecord::new("two", "shared").with_node(shared),
        ]);
        session.select_all_visible();

        let batch = session.download_batch();
        let names: Vec<_> = batch
            .entries
            .iter()
            .map(|e| e.archive_entry_name.as_str())
            .collect();
        assert_eq!(names, vec!["shared/a.nc"]);
    }

    #[test]
    fn huge_selection_saturates_instead_of_overflowing() {
        let mut session = CatalogSession::new(vec![
            CaseRecord::new("caseA", "caseA")
                .with_node(node("caseA", &[("a.nc", u64::MAX), ("b.nc", u64::MAX)])),
        ]);
        session.select_all_visible();

        assert_eq!(session.total_selected_size(), u64::MAX);
        assert_eq!(session.view().cases[0].visible_bytes, u64::MAX);

        let batch = session.download_batch();
        let downloader = BatchDownloader::new(DownloadConfig::new());
        assert!(matches!(
            downloader.check(&batch),
            Err(Error::Oversize { total: u64::MAX, .. })
        ));
    }
}
