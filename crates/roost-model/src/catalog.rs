//! The canonical in-memory set of installed launchable applications.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::hidden::HiddenSet;
use crate::key::ComponentKey;

/// One launchable (package, activity, user) tuple.
#[derive(Clone, Debug, PartialEq)]
pub struct AppEntry {
    pub key: ComponentKey,
    pub title: String,
    /// First-install timestamp, epoch milliseconds.
    pub install_time: i64,
    /// Lazily materialized themed-icon handle (a path into the icon cache).
    pub icon: Option<PathBuf>,
    /// Set while the owning package is suspended by the system.
    pub suspended: bool,
    /// Set when the entry needs its icon/title re-resolved.
    pub dirty: bool,
}

impl AppEntry {
    pub fn new(key: ComponentKey, title: impl Into<String>, install_time: i64) -> Self {
        Self {
            key,
            title: title.into(),
            install_time,
            icon: None,
            suspended: false,
            dirty: false,
        }
    }
}

/// The entries touched by one catalog mutation, consumed by bind callbacks.
#[derive(Clone, Debug, Default)]
pub struct CatalogDelta {
    pub added: Vec<AppEntry>,
    pub updated: Vec<AppEntry>,
    pub removed: Vec<ComponentKey>,
}

impl CatalogDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Mapping from component key to entry, mutated exclusively by the
/// scheduler's worker thread. Not internally synchronized: the single-writer
/// discipline is the locking strategy.
#[derive(Debug, Default)]
pub struct AppCatalog {
    entries: HashMap<ComponentKey, AppEntry>,
    hidden: HiddenSet,
    /// Bumped on every mutation; the scheduler recomputes the projection
    /// whenever it observes a new generation.
    generation: u64,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ComponentKey) -> Option<&AppEntry> {
        self.entries.get(key)
    }

    pub fn hidden(&self) -> &HiddenSet {
        &self.hidden
    }

    /// Unordered snapshot of all entries, hidden ones included.
    pub fn snapshot(&self) -> Vec<AppEntry> {
        self.entries.values().cloned().collect()
    }

    /// Replaces the whole catalog, e.g. after a full scan.
    pub fn replace_all(&mut self, entries: Vec<AppEntry>) -> CatalogDelta {
        let mut delta = CatalogDelta::default();
        let mut next = HashMap::with_capacity(entries.len());
        for entry in entries {
            match self.entries.remove(&entry.key) {
                Some(old) if old == entry => {}
                Some(_) => delta.updated.push(entry.clone()),
                None => delta.added.push(entry.clone()),
            }
            next.insert(entry.key.clone(), entry);
        }
        delta.removed = self.entries.keys().cloned().collect();
        self.entries = next;
        self.generation += 1;
        delta
    }

    /// Inserts new entries and updates existing ones in place.
    pub fn upsert(&mut self, entries: Vec<AppEntry>) -> CatalogDelta {
        let mut delta = CatalogDelta::default();
        for entry in entries {
            match self.entries.insert(entry.key.clone(), entry.clone()) {
                Some(old) if old == entry => {}
                Some(_) => delta.updated.push(entry),
                None => delta.added.push(entry),
            }
        }
        if !delta.is_empty() {
            self.generation += 1;
        }
        delta
    }

    pub fn remove(&mut self, keys: &[ComponentKey]) -> CatalogDelta {
        let mut delta = CatalogDelta::default();
        for key in keys {
            if self.entries.remove(key).is_some() {
                delta.removed.push(key.clone());
            }
        }
        if !delta.is_empty() {
            self.generation += 1;
        }
        delta
    }

    /// Removes every entry whose key matches `predicate`.
    pub fn remove_matching(&mut self, predicate: impl Fn(&ComponentKey) -> bool) -> CatalogDelta {
        let keys: Vec<ComponentKey> =
            self.entries.keys().filter(|k| predicate(k)).cloned().collect();
        self.remove(&keys)
    }

    /// Mutates matching entries in place, reporting them as updated.
    pub fn update_matching(
        &mut self,
        predicate: impl Fn(&AppEntry) -> bool,
        mut apply: impl FnMut(&mut AppEntry),
    ) -> CatalogDelta {
        let mut delta = CatalogDelta::default();
        for entry in self.entries.values_mut() {
            if predicate(entry) {
                apply(entry);
                delta.updated.push(entry.clone());
            }
        }
        if !delta.is_empty() {
            self.generation += 1;
        }
        delta
    }

    /// Swaps in a new hidden set. The entries themselves are untouched; only
    /// the visible projection changes.
    pub fn apply_hidden_set(&mut self, hidden: HiddenSet) {
        if self.hidden != hidden {
            self.hidden = hidden;
            self.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::UserId;

    fn entry(pkg: &str, class: &str, t: i64) -> AppEntry {
        AppEntry::new(ComponentKey::new(pkg, class, UserId(0)), pkg, t)
    }

    #[test]
    fn upsert_then_remove_matches_plain_map() {
        // Serialized-task determinism: the catalog must behave exactly like
        // a plain map driven by the same operation sequence.
        let mut catalog = AppCatalog::new();
        let mut reference: HashMap<ComponentKey, AppEntry> = HashMap::new();

        let ops: Vec<(&str, AppEntry)> = vec![
            ("up", entry("a", "a.Main", 1)),
            ("up", entry("b", "b.Main", 2)),
            ("up", entry("a", "a.Main", 3)),
            ("rm", entry("b", "b.Main", 0)),
            ("up", entry("c", "c.Main", 4)),
            ("rm", entry("missing", "missing.Main", 0)),
        ];
        for (op, e) in ops {
            match op {
                "up" => {
                    reference.insert(e.key.clone(), e.clone());
                    catalog.upsert(vec![e]);
                }
                _ => {
                    reference.remove(&e.key);
                    catalog.remove(std::slice::from_ref(&e.key));
                }
            }
        }

        let mut got = catalog.snapshot();
        let mut want: Vec<AppEntry> = reference.into_values().collect();
        got.sort_by(|a, b| a.key.cmp(&b.key));
        want.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(got, want);
    }

    #[test]
    fn replace_all_reports_full_delta() {
        let mut catalog = AppCatalog::new();
        catalog.upsert(vec![entry("a", "a.Main", 1), entry("b", "b.Main", 2)]);

        let delta = catalog.replace_all(vec![entry("a", "a.Main", 9), entry("c", "c.Main", 3)]);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].key.package, "c");
        assert_eq!(delta.updated.len(), 1);
        assert_eq!(delta.updated[0].install_time, 9);
        assert_eq!(delta.removed.len(), 1);
        assert_eq!(delta.removed[0].package, "b");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn unchanged_upsert_reports_nothing() {
        let mut catalog = AppCatalog::new();
        catalog.upsert(vec![entry("a", "a.Main", 1)]);
        let generation = catalog.generation();

        let delta = catalog.upsert(vec![entry("a", "a.Main", 1)]);
        assert!(delta.is_empty());
        assert_eq!(catalog.generation(), generation);
    }

    #[test]
    fn hidden_set_does_not_delete_entries() {
        let mut catalog = AppCatalog::new();
        catalog.upsert(vec![entry("a", "a.Main", 1)]);

        let mut hidden = HiddenSet::new();
        hidden.insert("a", "a.Main");
        catalog.apply_hidden_set(hidden);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.hidden().contains("a", "a.Main"));
    }
}
