//! Alphabetic section bucketing.

use std::collections::HashMap;

/// Maps an app title to the section it belongs to ("A".."Z", "#", ...).
///
/// Implementations are locale-specific. A locale whose natural sort order is
/// not a simple bucket-by-first-character scheme (e.g. pinyin collation)
/// returns `true` from [`SectionIndexer::requires_section_regroup`], which
/// makes the projection re-group sorted entries by section name so sections
/// stay contiguous.
pub trait SectionIndexer: Send {
    fn section_name(&self, title: &str) -> String;

    fn requires_section_regroup(&self) -> bool {
        false
    }
}

/// Default bucketing: first alphabetic character, uppercased; everything
/// else (digits, symbols, empty titles) lands in "#".
#[derive(Debug, Default)]
pub struct LatinIndexer;

impl SectionIndexer for LatinIndexer {
    fn section_name(&self, title: &str) -> String {
        match title.trim().chars().next() {
            Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
            _ => "#".to_string(),
        }
    }
}

/// Per-title section-name memoization, the only state the projection keeps
/// across recomputations.
#[derive(Debug, Default)]
pub struct SectionNameCache {
    names: HashMap<String, String>,
}

impl SectionNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, title: &str, indexer: &dyn SectionIndexer) -> String {
        if let Some(name) = self.names.get(title) {
            return name.clone();
        }
        let name = indexer.section_name(title);
        self.names.insert(title.to_string(), name.clone());
        name
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_buckets() {
        let indexer = LatinIndexer;
        assert_eq!(indexer.section_name("Banana"), "B");
        assert_eq!(indexer.section_name("apple"), "A");
        assert_eq!(indexer.section_name("  zebra"), "Z");
        assert_eq!(indexer.section_name("1Password"), "#");
        assert_eq!(indexer.section_name(""), "#");
        assert_eq!(indexer.section_name("ärm"), "Ä");
    }

    #[test]
    fn cache_memoizes() {
        let mut cache = SectionNameCache::new();
        let indexer = LatinIndexer;
        assert_eq!(cache.get_or_compute("Mail", &indexer), "M");
        // A second lookup for the same title hits the memo.
        assert_eq!(cache.get_or_compute("Mail", &indexer), "M");
    }
}
