//! Which files of which cases are selected.
//!
//! Selection is scoped per case: the same file name in two cases is two
//! independent selections. Whether a case is fully selected is maintained
//! alongside the file sets and always recomputed against the case's visible
//! files; partial selection is only ever derived.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::record::{CaseId, CaseRecord};

/// Derived selection status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    None,
    Partial,
    Full,
}

/// Selected file keys per case, plus the set of fully selected cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    files: BTreeMap<CaseId, BTreeSet<String>>,
    full: BTreeSet<CaseId>,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips one file of a case, then recomputes the case's full status.
    ///
    /// Keys outside `visible` cannot be selected; returns false and leaves
    /// the state untouched for them.
    pub fn toggle_file(&mut self, case: &CaseId, key: &str, visible: &BTreeSet<String>) -> bool {
        if !visible.contains(key) {
            log::debug!("Ignoring toggle of {key} in {case}: not visible");
            return false;
        }
        let set = self.files.entry(case.clone()).or_default();
        if !set.remove(key) {
            set.insert(key.to_string());
        }
        self.refresh_case(case, visible);
        true
    }

    /// Tri-state toggle of a whole case in one transition.
    ///
    /// A case that is not fully selected gets every visible file selected;
    /// a fully selected case gets every visible file deselected.
    pub fn toggle_case(&mut self, case: &CaseId, visible: &BTreeSet<String>) {
        if visible.is_empty() {
            return;
        }
        let set = self.files.entry(case.clone()).or_default();
        if visible.is_subset(set) {
            set.retain(|k| !visible.contains(k));
        } else {
            set.extend(visible.iter().cloned());
        }
        self.refresh_case(case, visible);
    }

    /// Selects every visible file of every given case.
    pub fn select_all<'a, I>(&mut self, cases: I)
    where
        I: IntoIterator<Item = (&'a CaseId, &'a BTreeSet<String>)>,
    {
        for (case, visible) in cases {
            if visible.is_empty() {
                continue;
            }
            self.files
                .entry(case.clone())
                .or_default()
                .extend(visible.iter().cloned());
            self.refresh_case(case, visible);
        }
    }

    /// Deselects everything.
    pub fn clear_all(&mut self) {
        self.files.clear();
        self.full.clear();
    }

    /// Derives None/Partial/Full for a case from its visible files.
    #[must_use]
    pub fn tri_state(&self, case: &CaseId, visible: &BTreeSet<String>) -> TriState {
        let Some(set) = self.files.get(case) else {
            return TriState::None;
        };
        let selected = visible.iter().filter(|k| set.contains(*k)).count();
        match selected {
            0 => TriState::None,
            n if n == visible.len() => TriState::Full,
            _ => TriState::Partial,
        }
    }

    /// Returns true if the case is recorded as fully selected.
    #[must_use]
    pub fn is_full(&self, case: &CaseId) -> bool {
        self.full.contains(case)
    }

    /// Returns true if the file is selected in the given case.
    #[must_use]
    pub fn is_selected(&self, case: &CaseId, key: &str) -> bool {
        self.files.get(case).is_some_and(|s| s.contains(key))
    }

    /// Selected keys of one case.
    pub fn selected_keys(&self, case: &CaseId) -> impl Iterator<Item = &str> {
        self.files
            .get(case)
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    /// Cases with at least one selected file.
    pub fn selected_cases(&self) -> impl Iterator<Item = &CaseId> {
        self.files
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, _)| id)
    }

    /// Fully selected cases.
    #[must_use]
    pub const fn full_cases(&self) -> &BTreeSet<CaseId> {
        &self.full
    }

    /// Number of selected files across all cases.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.values().all(BTreeSet::is_empty)
    }

    /// Sum of sizes of every selected file, resolved through its case.
    ///
    /// Keys that no longer resolve (unknown case, unresolved node, vanished
    /// file) contribute nothing.
    #[must_use]
    pub fn total_selected_size(&self, cases: &[CaseRecord]) -> u64 {
        let by_id: HashMap<&CaseId, &CaseRecord> = cases.iter().map(|c| (&c.id, c)).collect();
        self.files
            .iter()
            .filter_map(|(id, keys)| {
                let node = by_id.get(id).and_then(|c| c.resolved_node())?;
                Some((node, keys))
            })
            .flat_map(|(node, keys)| keys.iter().filter_map(move |k| node.file_at(k)))
            .fold(0_u64, |total, f| total.saturating_add(f.size_bytes))
    }

    /// Recomputes whether a case is fully selected.
    ///
    /// A case with no visible files is never full.
    pub fn refresh_case(&mut self, case: &CaseId, visible: &BTreeSet<String>) {
        let full = !visible.is_empty()
            && self
                .files
                .get(case)
                .is_some_and(|set| visible.is_subset(set));
        if full {
            self.full.insert(case.clone());
        } else {
            self.full.remove(case);
        }
        if self.files.get(case).is_some_and(BTreeSet::is_empty) {
            self.files.remove(case);
        }
    }

    /// Drops every selected key of `case` that is not in `visible`.
    ///
    /// Returns the dropped keys.
    pub(crate) fn retain_visible(
        &mut self,
        case: &CaseId,
        visible: &BTreeSet<String>,
    ) -> Vec<String> {
        let Some(set) = self.files.get_mut(case) else {
            return Vec::new();
        };
        let dropped: Vec<String> = set.difference(visible).cloned().collect();
        set.retain(|k| visible.contains(k));
        dropped
    }

    /// Ids of every case with selection state.
    pub(crate) fn tracked_cases(&self) -> Vec<CaseId> {
        self.files
            .keys()
            .chain(self.full.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
