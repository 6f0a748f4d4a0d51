//! Keeps the selection valid after the visible file set changes.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::CaseId;
use crate::selection::SelectionState;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Selected files that are no longer visible, per case.
    pub dropped: BTreeMap<CaseId, Vec<String>>,
}

impl ReconcileOutcome {
    /// Total number of deselected files.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.dropped.values().map(Vec::len).sum()
    }
}

/// Intersects the selection with the newly visible files and recomputes
/// full-selection status for every case from scratch.
///
/// Cases missing from `visible` (filtered out of the catalog, or not yet
/// resolved) contribute an empty visible set: their selections are dropped
/// and they are never full.
pub fn reconcile(
    selection: &mut SelectionState,
    visible: &BTreeMap<CaseId, BTreeSet<String>>,
) -> ReconcileOutcome {
    let empty = BTreeSet::new();
    let mut outcome = ReconcileOutcome::default();

    for case in selection.tracked_cases() {
        let keys = visible.get(&case).unwrap_or(&empty);
        let dropped = selection.retain_visible(&case, keys);
        selection.refresh_case(&case, keys);
        if !dropped.is_empty() {
            outcome.dropped.insert(case, dropped);
        }
    }

    if !outcome.dropped.is_empty() {
        log::info!(
            "Deselected {} file(s) in {} case(s) that are no longer visible",
            outcome.dropped_count(),
            outcome.dropped.len()
        );
    }
    outcome
}
