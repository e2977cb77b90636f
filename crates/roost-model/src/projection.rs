//! The sectioned, grid-positioned projection of the catalog.
//!
//! [`SectionedProjection::compute`] is a pure function of its inputs: it is
//! recomputed wholesale on every relevant change and never mutated in place.
//! The only state retained across calls is the section-name memoization in
//! [`SectionNameCache`].

use std::cmp::Ordering;
use std::collections::HashMap;

use log::warn;

use crate::catalog::{AppCatalog, AppEntry};
use crate::indexer::{SectionIndexer, SectionNameCache};
use crate::key::ComponentKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Alphabetical,
    InstallTime,
}

/// How fast-scroll touch fractions are distributed over anchors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FastScrollDistribution {
    ByRows,
    /// Evenly per remaining section. The default, matching how a scrubber
    /// with per-letter labels feels best.
    #[default]
    BySections,
}

/// Decides whether the next section is folded into the one being built.
/// Merging keeps grids visually dense; the exact policy belongs to the
/// caller, not the core.
pub trait MergePolicy: Send {
    /// `merged_apps` is the app count of the section built so far,
    /// `next_apps` the count of the candidate section, `merge_count` how many
    /// raw sections the current one already swallowed.
    fn continue_merging(
        &self,
        merged_apps: usize,
        next_apps: usize,
        apps_per_row: usize,
        merge_count: usize,
    ) -> bool;
}

/// Never merges; every bucket keeps its own header.
#[derive(Debug, Default)]
pub struct NoMerge;

impl MergePolicy for NoMerge {
    fn continue_merging(&self, _: usize, _: usize, _: usize, _: usize) -> bool {
        false
    }
}

/// Merges adjacent sections while the combined app count still fits the
/// given number of grid rows.
#[derive(Debug)]
pub struct FillRowsMerge {
    pub max_rows: usize,
}

impl MergePolicy for FillRowsMerge {
    fn continue_merging(
        &self,
        merged_apps: usize,
        next_apps: usize,
        apps_per_row: usize,
        _merge_count: usize,
    ) -> bool {
        apps_per_row > 0 && merged_apps + next_apps <= apps_per_row * self.max_rows
    }
}

/// Everything the projection derives its output from, besides the catalog.
pub struct ProjectionParams {
    pub sort_mode: SortMode,
    pub apps_per_row: usize,
    pub predicted_per_row: usize,
    /// Predicted components, best first. Entries not resolvable in the
    /// catalog are skipped and do not count toward the row budget.
    pub predicted: Vec<ComponentKey>,
    /// When set, output order is the filter's order and no section headers
    /// are emitted.
    pub search_filter: Option<Vec<ComponentKey>>,
    pub merge_policy: Box<dyn MergePolicy>,
    pub indexer: Box<dyn SectionIndexer>,
    pub fast_scroll: FastScrollDistribution,
}

impl ProjectionParams {
    pub fn new(apps_per_row: usize) -> Self {
        Self {
            sort_mode: SortMode::default(),
            apps_per_row,
            predicted_per_row: apps_per_row,
            predicted: Vec::new(),
            search_filter: None,
            merge_policy: Box::new(NoMerge),
            indexer: Box::new(crate::indexer::LatinIndexer),
            fast_scroll: FastScrollDistribution::default(),
        }
    }

    pub fn has_filter(&self) -> bool {
        self.search_filter.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdapterItemKind {
    SectionBreak,
    App(AppEntry),
    PredictedApp(AppEntry),
    EmptySearch,
    SearchDivider,
    MarketSearch,
}

impl AdapterItemKind {
    pub fn is_app(&self) -> bool {
        matches!(self, AdapterItemKind::App(_) | AdapterItemKind::PredictedApp(_))
    }
}

/// One display item. Grid fields are meaningful for app items only.
#[derive(Clone, Debug, PartialEq)]
pub struct AdapterItem {
    pub position: usize,
    pub kind: AdapterItemKind,
    pub section_name: String,
    /// Index into [`SectionedProjection::sections`].
    pub section_index: usize,
    /// Index of this app within its (possibly merged) section.
    pub section_app_index: usize,
    pub row_index: usize,
    pub row_app_index: usize,
    /// Index of this app not counting non-app items.
    pub app_index: usize,
}

/// A contiguous run of display items sharing one header (post-merge).
#[derive(Clone, Debug, PartialEq)]
pub struct SectionInfo {
    /// Name of the first bucket in the section; empty for predictions.
    pub name: String,
    pub num_apps: usize,
    pub break_position: Option<usize>,
    pub first_app_position: Option<usize>,
}

/// Fast-scroll anchors are kept per raw bucket, so merged sections still
/// expose every letter to the scrubber.
#[derive(Clone, Debug, PartialEq)]
pub struct FastScrollAnchor {
    pub section_name: String,
    pub item_position: usize,
    pub touch_fraction: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionedProjection {
    pub items: Vec<AdapterItem>,
    pub sections: Vec<SectionInfo>,
    pub fast_scroll: Vec<FastScrollAnchor>,
    pub num_app_rows: usize,
}

/// A run of entries sharing one bucket key, before merging.
struct RawSection {
    name: String,
    predicted: bool,
    entries: Vec<AppEntry>,
}

impl SectionedProjection {
    /// Number of visible apps in the projection.
    pub fn num_apps(&self) -> usize {
        self.items.iter().filter(|i| i.kind.is_app()).count()
    }

    pub fn compute(
        catalog: &AppCatalog,
        params: &ProjectionParams,
        cache: &mut SectionNameCache,
    ) -> SectionedProjection {
        let hidden = catalog.hidden();
        let mut visible: Vec<AppEntry> = catalog
            .snapshot()
            .into_iter()
            .filter(|e| !hidden.contains(&e.key.package, &e.key.class))
            .collect();

        let by_key: HashMap<ComponentKey, AppEntry> =
            visible.iter().map(|e| (e.key.clone(), e.clone())).collect();

        let ordered: Vec<AppEntry> = if let Some(filter) = &params.search_filter {
            // Search mode: the filter dictates the order; unknown keys are
            // dropped.
            filter.iter().filter_map(|k| by_key.get(k).cloned()).collect()
        } else {
            for entry in &visible {
                // Warm the memo so section lookups below are cheap.
                cache.get_or_compute(&entry.title, params.indexer.as_ref());
            }
            match params.sort_mode {
                SortMode::Alphabetical => visible.sort_by(compare_alphabetical),
                SortMode::InstallTime => visible.sort_by(compare_install_time),
            }
            if params.sort_mode == SortMode::Alphabetical
                && params.indexer.requires_section_regroup()
            {
                // Locales such as Simplified Chinese sort titles in an order
                // that scatters bucket keys; re-group contiguously by
                // section while keeping the per-section title order.
                visible.sort_by(|a, b| {
                    let sa = cache.get_or_compute(&a.title, params.indexer.as_ref());
                    let sb = cache.get_or_compute(&b.title, params.indexer.as_ref());
                    compare_section_names(&sa, &sb)
                });
            }
            visible
        };

        let mut raw_sections: Vec<RawSection> = Vec::new();

        if !params.has_filter() && !params.predicted.is_empty() && params.predicted_per_row > 0 {
            let mut predicted_entries = Vec::new();
            for key in &params.predicted {
                match by_key.get(key) {
                    Some(entry) => predicted_entries.push(entry.clone()),
                    None => warn!("predicted app not in catalog: {key}"),
                }
                if predicted_entries.len() == params.predicted_per_row {
                    break;
                }
            }
            if !predicted_entries.is_empty() {
                raw_sections.push(RawSection {
                    name: String::new(),
                    predicted: true,
                    entries: predicted_entries,
                });
            }
        }

        for entry in ordered {
            let name = cache.get_or_compute(&entry.title, params.indexer.as_ref());
            match raw_sections.last_mut() {
                Some(last) if !last.predicted && last.name == name => last.entries.push(entry),
                _ => raw_sections.push(RawSection { name, predicted: false, entries: vec![entry] }),
            }
        }

        let groups = merge_sections(raw_sections, params);
        let mut projection = emit_items(groups, params);
        assign_grid_positions(&mut projection, params);
        assign_touch_fractions(&mut projection, params);
        projection
    }
}

/// Groups adjacent raw sections into display sections per the merge policy.
/// No merging happens in search mode or without a valid row size.
fn merge_sections(raw: Vec<RawSection>, params: &ProjectionParams) -> Vec<Vec<RawSection>> {
    let mut groups: Vec<Vec<RawSection>> = Vec::new();
    let mergeable = !params.has_filter() && params.apps_per_row > 0;
    for section in raw {
        if mergeable {
            if let Some(group) = groups.last_mut() {
                let merged_apps: usize = group.iter().map(|s| s.entries.len()).sum();
                if params.merge_policy.continue_merging(
                    merged_apps,
                    section.entries.len(),
                    params.apps_per_row,
                    group.len(),
                ) {
                    group.push(section);
                    continue;
                }
            }
        }
        groups.push(vec![section]);
    }
    groups
}

fn emit_items(groups: Vec<Vec<RawSection>>, params: &ProjectionParams) -> SectionedProjection {
    let mut projection = SectionedProjection::default();
    let mut position = 0usize;
    let mut app_index = 0usize;
    let has_filter = params.has_filter();
    let had_results = groups.iter().any(|g| g.iter().any(|s| !s.entries.is_empty()));

    for group in groups {
        let section_index = projection.sections.len();
        let mut section = SectionInfo {
            name: group.first().map(|s| s.name.clone()).unwrap_or_default(),
            num_apps: 0,
            break_position: None,
            first_app_position: None,
        };

        if !has_filter {
            section.break_position = Some(position);
            projection.items.push(AdapterItem {
                position,
                kind: AdapterItemKind::SectionBreak,
                section_name: section.name.clone(),
                section_index,
                section_app_index: 0,
                row_index: 0,
                row_app_index: 0,
                app_index: 0,
            });
            position += 1;
        }

        for raw in group {
            let mut anchor_position = None;
            for entry in raw.entries {
                let kind = if raw.predicted {
                    AdapterItemKind::PredictedApp(entry)
                } else {
                    AdapterItemKind::App(entry)
                };
                if anchor_position.is_none() {
                    anchor_position = Some(position);
                }
                if section.first_app_position.is_none() {
                    section.first_app_position = Some(position);
                }
                projection.items.push(AdapterItem {
                    position,
                    kind,
                    section_name: raw.name.clone(),
                    section_index,
                    section_app_index: section.num_apps,
                    row_index: 0,
                    row_app_index: 0,
                    app_index,
                });
                section.num_apps += 1;
                position += 1;
                app_index += 1;
            }
            if let Some(item_position) = anchor_position {
                projection.fast_scroll.push(FastScrollAnchor {
                    section_name: raw.name,
                    item_position,
                    touch_fraction: 0.0,
                });
            }
        }
        projection.sections.push(section);
    }

    if has_filter {
        if !had_results {
            projection.items.push(AdapterItem {
                position,
                kind: AdapterItemKind::EmptySearch,
                section_name: String::new(),
                section_index: 0,
                section_app_index: 0,
                row_index: 0,
                row_app_index: 0,
                app_index: 0,
            });
            position += 1;
        } else {
            projection.items.push(AdapterItem {
                position,
                kind: AdapterItemKind::SearchDivider,
                section_name: String::new(),
                section_index: 0,
                section_app_index: 0,
                row_index: 0,
                row_app_index: 0,
                app_index: 0,
            });
            position += 1;
        }
        projection.items.push(AdapterItem {
            position,
            kind: AdapterItemKind::MarketSearch,
            section_name: String::new(),
            section_index: 0,
            section_app_index: 0,
            row_index: 0,
            row_app_index: 0,
            app_index: 0,
        });
    }

    projection
}

fn assign_grid_positions(projection: &mut SectionedProjection, params: &ProjectionParams) {
    if params.apps_per_row == 0 {
        return;
    }
    let mut apps_in_section = 0usize;
    let mut apps_in_row = 0usize;
    let mut row: Option<usize> = None;
    for item in &mut projection.items {
        match item.kind {
            AdapterItemKind::SectionBreak => apps_in_section = 0,
            AdapterItemKind::App(_) | AdapterItemKind::PredictedApp(_) => {
                if apps_in_section % params.apps_per_row == 0 {
                    apps_in_row = 0;
                    row = Some(row.map_or(0, |r| r + 1));
                }
                item.row_index = row.unwrap_or(0);
                item.row_app_index = apps_in_row;
                apps_in_section += 1;
                apps_in_row += 1;
            }
            _ => {}
        }
    }
    projection.num_app_rows = row.map_or(0, |r| r + 1);
}

fn assign_touch_fractions(projection: &mut SectionedProjection, params: &ProjectionParams) {
    if params.apps_per_row == 0 || projection.fast_scroll.is_empty() {
        return;
    }
    match params.fast_scroll {
        FastScrollDistribution::ByRows => {
            if projection.num_app_rows == 0 {
                return;
            }
            let row_fraction = 1.0 / projection.num_app_rows as f32;
            let items = &projection.items;
            for anchor in &mut projection.fast_scroll {
                let item = &items[anchor.item_position];
                if !item.kind.is_app() {
                    anchor.touch_fraction = 0.0;
                    continue;
                }
                let sub = item.row_app_index as f32 * (row_fraction / params.apps_per_row as f32);
                anchor.touch_fraction = item.row_index as f32 * row_fraction + sub;
            }
        }
        FastScrollDistribution::BySections => {
            let per_section = 1.0 / projection.fast_scroll.len() as f32;
            let mut cumulative = 0.0f32;
            for anchor in &mut projection.fast_scroll {
                anchor.touch_fraction = cumulative;
                cumulative += per_section;
            }
        }
    }
}

/// Titles not starting with a letter or digit sort last; ties fall back to
/// a case-insensitive title compare, then component identity.
fn compare_titles(a: &AppEntry, b: &AppEntry) -> Ordering {
    let a_alnum = a.title.chars().next().is_some_and(char::is_alphanumeric);
    let b_alnum = b.title.chars().next().is_some_and(char::is_alphanumeric);
    match (a_alnum, b_alnum) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.key.cmp(&b.key))
}

fn compare_alphabetical(a: &AppEntry, b: &AppEntry) -> Ordering {
    compare_titles(a, b)
}

fn compare_install_time(a: &AppEntry, b: &AppEntry) -> Ordering {
    a.install_time.cmp(&b.install_time).then_with(|| compare_titles(a, b))
}

/// Letter sections order alphabetically; the "#" bucket sorts after them.
fn compare_section_names(a: &str, b: &str) -> Ordering {
    let a_letter = a.chars().next().is_some_and(char::is_alphabetic);
    let b_letter = b.chars().next().is_some_and(char::is_alphabetic);
    match (a_letter, b_letter) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidden::HiddenSet;
    use crate::key::UserId;

    fn key(pkg: &str) -> ComponentKey {
        ComponentKey::new(pkg, format!("{pkg}.Main"), UserId(0))
    }

    fn entry(pkg: &str, title: &str, t: i64) -> AppEntry {
        AppEntry::new(key(pkg), title, t)
    }

    fn catalog_of(entries: Vec<AppEntry>) -> AppCatalog {
        let mut catalog = AppCatalog::new();
        catalog.replace_all(entries);
        catalog
    }

    fn titles_in_order(p: &SectionedProjection) -> Vec<String> {
        p.items
            .iter()
            .filter_map(|i| match &i.kind {
                AdapterItemKind::App(e) | AdapterItemKind::PredictedApp(e) => {
                    Some(e.title.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let catalog = catalog_of(vec![
            entry("a", "Apple", 100),
            entry("b", "Banana", 50),
            entry("c", "Cherry", 200),
        ]);
        let params = ProjectionParams::new(4);
        let mut cache = SectionNameCache::new();
        let first = SectionedProjection::compute(&catalog, &params, &mut cache);
        let second = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(first, second);
    }

    #[test]
    fn install_time_then_alphabetical_order() {
        let catalog = catalog_of(vec![
            entry("a", "Apple", 100),
            entry("b", "Banana", 50),
            entry("c", "Cherry", 200),
        ]);
        let mut cache = SectionNameCache::new();

        let mut params = ProjectionParams::new(4);
        params.sort_mode = SortMode::InstallTime;
        let p = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(titles_in_order(&p), vec!["Banana", "Apple", "Cherry"]);

        params.sort_mode = SortMode::Alphabetical;
        let p = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(titles_in_order(&p), vec!["Apple", "Banana", "Cherry"]);
    }

    #[test]
    fn install_time_ties_break_by_title_then_key() {
        let catalog = catalog_of(vec![
            entry("zz", "Same", 10),
            entry("aa", "Same", 10),
            entry("mm", "Another", 10),
        ]);
        let mut params = ProjectionParams::new(4);
        params.sort_mode = SortMode::InstallTime;
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());
        let packages: Vec<String> = p
            .items
            .iter()
            .filter_map(|i| match &i.kind {
                AdapterItemKind::App(e) => Some(e.key.package.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(packages, vec!["mm", "aa", "zz"]);
    }

    #[test]
    fn sections_merge_per_policy() {
        // Two sections of 2 and 3 apps, apps-per-row 5, and a policy that
        // merges while the result fits one row: one section of 5 remains.
        let catalog = catalog_of(vec![
            entry("a1", "Alpha", 1),
            entry("a2", "Amber", 2),
            entry("b1", "Bison", 3),
            entry("b2", "Blue", 4),
            entry("b3", "Bolt", 5),
        ]);
        let mut params = ProjectionParams::new(5);
        params.merge_policy = Box::new(FillRowsMerge { max_rows: 1 });
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());

        assert_eq!(p.sections.len(), 1);
        assert_eq!(p.sections[0].num_apps, 5);
        let breaks = p
            .items
            .iter()
            .filter(|i| i.kind == AdapterItemKind::SectionBreak)
            .count();
        assert_eq!(breaks, 1);
        // Both letters stay reachable from the scrubber.
        let names: Vec<&str> =
            p.fast_scroll.iter().map(|a| a.section_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        // All five apps sit on one row.
        assert_eq!(p.num_app_rows, 1);
    }

    #[test]
    fn hidden_filter_is_a_pure_view() {
        let mut catalog = catalog_of(vec![
            entry("a", "Apple", 1),
            entry("b", "Banana", 2),
            entry("c", "Cherry", 3),
        ]);
        let params = ProjectionParams::new(4);
        let mut cache = SectionNameCache::new();

        let mut hidden = HiddenSet::new();
        hidden.insert("a", "a.Main");
        catalog.apply_hidden_set(hidden.clone());
        let p = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(titles_in_order(&p), vec!["Banana", "Cherry"]);

        // Hiding an already-hidden app changes nothing.
        hidden.insert("a", "a.Main");
        catalog.apply_hidden_set(hidden);
        let again = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(p, again);

        // Unhiding restores the full set.
        catalog.apply_hidden_set(HiddenSet::new());
        let p = SectionedProjection::compute(&catalog, &params, &mut cache);
        assert_eq!(titles_in_order(&p), vec!["Apple", "Banana", "Cherry"]);
    }

    #[test]
    fn predicted_section_caps_and_skips_unresolved() {
        let catalog = catalog_of(vec![
            entry("a", "Apple", 1),
            entry("b", "Banana", 2),
            entry("c", "Cherry", 3),
        ]);
        let mut params = ProjectionParams::new(4);
        params.predicted_per_row = 2;
        params.predicted = vec![key("ghost"), key("c"), key("a"), key("b")];
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());

        // "ghost" is skipped without consuming budget; prediction row is
        // [Cherry, Apple], then the full alphabetical list follows.
        assert_eq!(
            titles_in_order(&p),
            vec!["Cherry", "Apple", "Apple", "Banana", "Cherry"]
        );
        let predicted = p
            .items
            .iter()
            .filter(|i| matches!(i.kind, AdapterItemKind::PredictedApp(_)))
            .count();
        assert_eq!(predicted, 2);
        assert_eq!(p.sections[0].name, "");
    }

    #[test]
    fn search_mode_emits_no_headers_and_appends_market_row() {
        let catalog = catalog_of(vec![
            entry("a", "Apple", 1),
            entry("b", "Banana", 2),
        ]);
        let mut params = ProjectionParams::new(4);
        params.search_filter = Some(vec![key("b"), key("a")]);
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());

        assert_eq!(titles_in_order(&p), vec!["Banana", "Apple"]);
        assert!(!p.items.iter().any(|i| i.kind == AdapterItemKind::SectionBreak));
        let tail: Vec<&AdapterItemKind> =
            p.items.iter().rev().take(2).map(|i| &i.kind).collect();
        assert_eq!(tail, vec![&AdapterItemKind::MarketSearch, &AdapterItemKind::SearchDivider]);
    }

    #[test]
    fn empty_search_results_emit_placeholder() {
        let catalog = catalog_of(vec![entry("a", "Apple", 1)]);
        let mut params = ProjectionParams::new(4);
        params.search_filter = Some(vec![key("nope")]);
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());
        assert!(p.items.iter().any(|i| i.kind == AdapterItemKind::EmptySearch));
        assert!(p.items.iter().any(|i| i.kind == AdapterItemKind::MarketSearch));
    }

    #[test]
    fn grid_positions_reset_per_section() {
        let catalog = catalog_of(vec![
            entry("a1", "Alpha", 1),
            entry("a2", "Amber", 2),
            entry("a3", "Atom", 3),
            entry("b1", "Bison", 4),
        ]);
        let params = ProjectionParams::new(2);
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());

        let grid: Vec<(usize, usize)> = p
            .items
            .iter()
            .filter(|i| i.kind.is_app())
            .map(|i| (i.row_index, i.row_app_index))
            .collect();
        // Section A wraps to a second row; section B starts a fresh row.
        assert_eq!(grid, vec![(0, 0), (0, 1), (1, 0), (2, 0)]);
        assert_eq!(p.num_app_rows, 3);
    }

    #[test]
    fn fast_scroll_fractions_by_sections() {
        let catalog = catalog_of(vec![
            entry("a", "Apple", 1),
            entry("b", "Banana", 2),
            entry("c", "Cherry", 3),
            entry("d", "Date", 4),
        ]);
        let params = ProjectionParams::new(4);
        let p = SectionedProjection::compute(&catalog, &params, &mut SectionNameCache::new());
        let fractions: Vec<f32> =
            p.fast_scroll.iter().map(|a| a.touch_fraction).collect();
        assert_eq!(fractions, vec![0.0, 0.25, 0.5, 0.75]);
    }
}
