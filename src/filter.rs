//! Narrowing the visible cases and files without touching the catalog.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{CaseFile, CatalogNode};
use crate::record::CaseRecord;

/// Value that toggles a whole dimension rather than filtering on itself.
pub const ALL_SENTINEL: &str = "All";

/// A categorical dimension cases can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    City,
    HeightDistribution,
    WindDirection,
    Density,
    Alignment,
}

impl Dimension {
    /// Every dimension, in display order.
    pub const ALL: [Self; 6] = [
        Self::Country,
        Self::City,
        Self::HeightDistribution,
        Self::WindDirection,
        Self::Density,
        Self::Alignment,
    ];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::City => "City",
            Self::HeightDistribution => "Standard Deviation of Building Height (m)",
            Self::WindDirection => "Wind Direction (deg)",
            Self::Density => "Plan Area Density",
            Self::Alignment => "Alignment",
        }
    }

    /// Parses the snake_case identifier used on the wire and command line.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "country" => Some(Self::Country),
            "city" => Some(Self::City),
            "height_distribution" => Some(Self::HeightDistribution),
            "wind_direction" => Some(Self::WindDirection),
            "density" => Some(Self::Density),
            "alignment" => Some(Self::Alignment),
            _ => None,
        }
    }
}

/// Active filter state.
///
/// An empty accepted set means "no restriction" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    accepted: BTreeMap<Dimension, BTreeSet<String>>,
    #[serde(default)]
    search: String,
    #[serde(default)]
    file_types: BTreeSet<String>,
}

impl FilterCriteria {
    /// Creates unrestricted criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts a dimension to the given values (builder style, unvalidated).
    #[must_use]
    pub fn with_values<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            self.accepted.remove(&dimension);
        } else {
            self.accepted.insert(dimension, set);
        }
        self
    }

    /// Sets the search text (builder style).
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Sets the file-type tokens (builder style, unvalidated).
    #[must_use]
    pub fn with_file_types<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_file_types(tokens);
        self
    }

    /// Accepted values for a dimension; empty when unrestricted.
    #[must_use]
    pub fn accepted(&self, dimension: Dimension) -> BTreeSet<String> {
        self.accepted.get(&dimension).cloned().unwrap_or_default()
    }

    /// Returns true if the dimension restricts the result.
    #[must_use]
    pub fn is_restricted(&self, dimension: Dimension) -> bool {
        self.accepted.get(&dimension).is_some_and(|s| !s.is_empty())
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    #[must_use]
    pub const fn file_types(&self) -> &BTreeSet<String> {
        &self.file_types
    }

    /// Replaces the file-type tokens; blank tokens are ignored.
    pub fn set_file_types<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .collect();
    }

    /// Toggles one value of a dimension.
    ///
    /// A regular value is added when absent and removed when present. The
    /// [`ALL_SENTINEL`] clears the dimension when every domain value is
    /// already accepted, and otherwise accepts the whole domain. Values
    /// outside `domain` are ignored. Changing the country restriction resets
    /// the city restriction. Returns true if the criteria changed.
    pub fn toggle_value(&mut self, dimension: Dimension, value: &str, domain: &[String]) -> bool {
        let set = self.accepted.entry(dimension).or_default();
        let changed = toggle_in(set, value, domain);
        if set.is_empty() {
            self.accepted.remove(&dimension);
        }
        if changed && dimension == Dimension::Country {
            self.accepted.remove(&Dimension::City);
        }
        changed
    }

    /// Toggles a file-type token with the same semantics as [`toggle_value`].
    ///
    /// [`toggle_value`]: Self::toggle_value
    pub fn toggle_file_type(&mut self, token: &str, domain: &[String]) -> bool {
        toggle_in(&mut self.file_types, token, domain)
    }

    /// Drops accepted values that are no longer in their domains.
    ///
    /// Returns true if the file-type tokens changed.
    pub fn prune<F>(&mut self, domain_of: F, file_domain: &[String]) -> bool
    where
        F: Fn(Dimension) -> Vec<String>,
    {
        for (dimension, set) in &mut self.accepted {
            let domain = domain_of(*dimension);
            set.retain(|v| domain.contains(v));
        }
        self.accepted.retain(|_, set| !set.is_empty());
        let before = self.file_types.len();
        self.file_types.retain(|t| file_domain.contains(t));
        before != self.file_types.len()
    }

    /// Returns true if a case passes every dimension and the search text.
    #[must_use]
    pub fn accepts(&self, case: &CaseRecord) -> bool {
        let dimensions_match = self.accepted.iter().all(|(dimension, set)| {
            set.is_empty() || case.value(*dimension).is_some_and(|v| set.contains(v))
        });
        dimensions_match && contains_ignore_case(&case.name, &self.search)
    }
}

fn toggle_in(set: &mut BTreeSet<String>, value: &str, domain: &[String]) -> bool {
    if value.eq_ignore_ascii_case(ALL_SENTINEL) {
        let full = !domain.is_empty() && domain.iter().all(|v| set.contains(v));
        if full {
            set.clear();
        } else {
            *set = domain.iter().cloned().collect();
        }
        return true;
    }
    if !domain.iter().any(|v| v == value) {
        log::debug!("Ignoring filter value {value:?} outside the observed domain");
        return false;
    }
    if !set.remove(value) {
        set.insert(value.to_string());
    }
    true
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Returns the cases passing `criteria`, in their original order.
///
/// When file-type tokens are active, a case is only shown if at least one
/// of its files matches.
#[must_use]
pub fn filter_cases<'a>(cases: &'a [CaseRecord], criteria: &FilterCriteria) -> Vec<&'a CaseRecord> {
    cases
        .iter()
        .filter(|case| criteria.accepts(case))
        .filter(|case| {
            criteria.file_types.is_empty() || !visible_files(case, criteria.file_types()).is_empty()
        })
        .collect()
}

/// Returns the files of `node` whose name contains any of `tokens`.
///
/// Matching is a case-insensitive substring test, not a suffix test. An
/// empty token set returns every file.
#[must_use]
pub fn filter_files<'a>(node: &'a CatalogNode, tokens: &BTreeSet<String>) -> Vec<CaseFile<'a>> {
    let tokens: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    node.walk_files()
        .into_iter()
        .filter(|entry| {
            tokens.is_empty() || {
                let name = entry.file.name.to_lowercase();
                tokens.iter().any(|t| name.contains(t.as_str()))
            }
        })
        .collect()
}

/// Visible files of a case; an unresolved case has none.
#[must_use]
pub fn visible_files<'a>(case: &'a CaseRecord, tokens: &BTreeSet<String>) -> Vec<CaseFile<'a>> {
    case.resolved_node()
        .map(|node| filter_files(node, tokens))
        .unwrap_or_default()
}

/// Distinct observed values of a dimension, in display order.
///
/// The city domain only covers cities of the accepted countries.
#[must_use]
pub fn value_domain(
    cases: &[CaseRecord],
    dimension: Dimension,
    criteria: &FilterCriteria,
) -> Vec<String> {
    let countries = criteria.accepted(Dimension::Country);
    let values: BTreeSet<&str> = cases
        .iter()
        .filter(|case| {
            dimension != Dimension::City
                || countries.is_empty()
                || case.country.as_ref().is_some_and(|c| countries.contains(c))
        })
        .filter_map(|case| case.value(dimension))
        .collect();

    let mut values: Vec<String> = values.into_iter().map(str::to_string).collect();
    if dimension == Dimension::WindDirection {
        values.sort_by(|a, b| compare_numeric(a, b));
    } else {
        values.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    }
    values
}

/// Distinct file extensions across every resolved case.
#[must_use]
pub fn file_type_domain(cases: &[CaseRecord]) -> Vec<String> {
    let exts: BTreeSet<String> = cases
        .iter()
        .filter_map(CaseRecord::resolved_node)
        .flat_map(|node| {
            node.walk_files()
                .into_iter()
                .filter_map(|entry| entry.file.extension())
                .collect::<Vec<_>>()
        })
        .collect();
    exts.into_iter().collect()
}

/// Numeric values ascending, then non-numeric values alphabetically.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileEntry;

    fn case(id: &str, country: &str, city: &str, wind: &str) -> CaseRecord {
        CaseRecord::new(id, id)
            .with_value(Dimension::Country, country)
            .with_value(Dimension::City, city)
            .with_value(Dimension::WindDirection, wind)
    }

    fn cases() -> Vec<CaseRecord> {
        vec![
            case("basel-1", "Switzerland", "Basel", "270"),
            case("zurich-1", "Switzerland", "Zurich", "90"),
            case("london-1", "UK", "London", "0"),
            case("london-2", "UK", "London", "180"),
        ]
    }

    fn ids(found: &[&CaseRecord]) -> Vec<String> {
        found.iter().map(|c| c.id.to_string()).collect()
    }

    #[test]
    fn unrestricted_criteria_pass_everything() {
        let cases = cases();
        assert_eq!(filter_cases(&cases, &FilterCriteria::new()).len(), 4);
    }

    #[test]
    fn dimensions_are_a_conjunction() {
        let cases = cases();
        let criteria = FilterCriteria::new()
            .with_values(Dimension::Country, ["UK"])
            .with_values(Dimension::WindDirection, ["180", "270"]);
        assert_eq!(ids(&filter_cases(&cases, &criteria)), vec!["london-2"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let cases = cases();
        let criteria = FilterCriteria::new().with_search("LONDON");
        assert_eq!(ids(&filter_cases(&cases, &criteria)), vec!["london-1", "london-2"]);
    }

    #[test]
    fn missing_field_fails_a_restricted_dimension() {
        let cases = vec![CaseRecord::new("bare", "bare")];
        let criteria = FilterCriteria::new().with_values(Dimension::Density, ["0.3"]);
        assert!(filter_cases(&cases, &criteria).is_empty());
    }

    #[test]
    fn toggle_value_is_symmetric_difference() {
        let domain = vec!["a".to_string(), "b".to_string()];
        let mut criteria = FilterCriteria::new();
        assert!(criteria.toggle_value(Dimension::Density, "a", &domain));
        assert_eq!(criteria.accepted(Dimension::Density), BTreeSet::from(["a".to_string()]));
        assert!(criteria.toggle_value(Dimension::Density, "a", &domain));
        assert!(!criteria.is_restricted(Dimension::Density));
    }

    #[test]
    fn toggle_value_ignores_values_outside_domain() {
        let domain = vec!["a".to_string()];
        let mut criteria = FilterCriteria::new();
        assert!(!criteria.toggle_value(Dimension::Density, "zzz", &domain));
        assert!(!criteria.is_restricted(Dimension::Density));
    }

    #[test]
    fn all_sentinel_fills_then_clears() {
        let domain = vec!["a".to_string(), "b".to_string()];
        let mut criteria = FilterCriteria::new();
        criteria.toggle_value(Dimension::Density, "a", &domain);
        criteria.toggle_value(Dimension::Density, ALL_SENTINEL, &domain);
        assert_eq!(criteria.accepted(Dimension::Density).len(), 2);
        criteria.toggle_value(Dimension::Density, ALL_SENTINEL, &domain);
        assert!(!criteria.is_restricted(Dimension::Density));
    }

    #[test]
    fn changing_country_resets_city() {
        let mut criteria = FilterCriteria::new().with_values(Dimension::City, ["Basel"]);
        criteria.toggle_value(Dimension::Country, "UK", &["UK".to_string()]);
        assert!(!criteria.is_restricted(Dimension::City));
    }

    #[test]
    fn city_domain_follows_accepted_countries() {
        let cases = cases();
        let criteria = FilterCriteria::new().with_values(Dimension::Country, ["Switzerland"]);
        assert_eq!(
            value_domain(&cases, Dimension::City, &criteria),
            vec!["Basel", "Zurich"]
        );
        assert_eq!(
            value_domain(&cases, Dimension::City, &FilterCriteria::new()),
            vec!["Basel", "London", "Zurich"]
        );
    }

    #[test]
    fn wind_direction_domain_sorts_numerically() {
        let mut cases = cases();
        cases.push(case("x", "UK", "Leeds", "variable"));
        assert_eq!(
            value_domain(&cases, Dimension::WindDirection, &FilterCriteria::new()),
            vec!["0", "90", "180", "270", "variable"]
        );
    }

    #[test]
    fn filter_files_uses_contains_not_suffix() {
        let node = CatalogNode::new("c")
            .with_file(FileEntry::new("run_ped.nc", 1, "u"))
            .with_file(FileEntry::new("run_ts.nc", 1, "u"))
            .with_file(FileEntry::new("view.PNG", 1, "u"));

        let all = filter_files(&node, &BTreeSet::new());
        assert_eq!(all.len(), 3);

        let ped = filter_files(&node, &BTreeSet::from(["_ped".to_string()]));
        assert_eq!(ped.len(), 1);
        assert_eq!(ped[0].key, "run_ped.nc");

        let png = filter_files(&node, &BTreeSet::from([".png".to_string()]));
        assert_eq!(png[0].key, "view.PNG");
    }

    #[test]
    fn file_types_hide_cases_without_matches() {
        let mut cases = cases();
        cases[0].node =
            Some(CatalogNode::new("basel-1").with_file(FileEntry::new("a.nc", 1, "u")));
        cases[1].node =
            Some(CatalogNode::new("zurich-1").with_file(FileEntry::new("a.png", 1, "u")));
        let criteria = FilterCriteria::new().with_file_types([".nc"]);
        assert_eq!(ids(&filter_cases(&cases, &criteria)), vec!["basel-1"]);
        assert_eq!(file_type_domain(&cases), vec![".nc", ".png"]);
    }

    #[test]
    fn prune_drops_values_outside_new_domain() {
        let mut criteria = FilterCriteria::new()
            .with_values(Dimension::Country, ["UK", "Atlantis"])
            .with_file_types([".nc", ".h5"]);
        let changed = criteria.prune(|_| vec!["UK".to_string()], &[".nc".to_string()]);
        assert!(changed);
        assert_eq!(criteria.accepted(Dimension::Country), BTreeSet::from(["UK".to_string()]));
        assert_eq!(criteria.file_types().len(), 1);
    }

    #[test]
    fn dimension_parse_matches_wire_names() {
        assert_eq!(Dimension::parse("wind_direction"), Some(Dimension::WindDirection));
        assert_eq!(Dimension::parse("country"), Some(Dimension::Country));
        assert_eq!(Dimension::parse("bogus"), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_case() -> impl Strategy<Value = CaseRecord> {
            ("[a-d]{1,4}", prop_oneof!["UK", "CH", "FR"], prop_oneof!["0", "90", "180"])
                .prop_map(|(name, country, wind)| {
                    CaseRecord::new(name.as_str(), name.as_str())
                        .with_value(Dimension::Country, country)
                        .with_value(Dimension::WindDirection, wind)
                })
        }

        proptest! {
            #[test]
            fn filter_cases_is_pure_and_order_preserving(
                cases in proptest::collection::vec(arb_case(), 0..12),
                countries in proptest::collection::btree_set(prop_oneof!["UK", "CH", "FR"], 0..3),
                search in "[a-d]{0,2}",
            ) {
                let criteria = FilterCriteria::new()
                    .with_values(Dimension::Country, countries)
                    .with_search(search);
                let snapshot = cases.clone();
                let first = filter_cases(&cases, &criteria);
                let second = filter_cases(&cases, &criteria);
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(&cases, &snapshot);

                let positions: Vec<usize> = first
                    .iter()
                    .map(|c| cases.iter().position(|o| std::ptr::eq(o, *c)).unwrap())
                    .collect();
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
