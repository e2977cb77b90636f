//! Persistence for the set of user-hidden applications.
//!
//! The on-disk format is a small XML document:
//!
//! ```xml
//! <apps>
//!   <app>
//!     <componentPackage>org.example.mail</componentPackage>
//!     <componentClass>org.example.mail.Inbox</componentClass>
//!   </app>
//! </apps>
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ModelError;

/// One hidden (package, class) pair. Hiding applies across profiles.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HiddenApp {
    pub package: String,
    pub class: String,
}

/// The set of hidden applications. Membership is a pure filter on the
/// projection; it never deletes catalog entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HiddenSet {
    entries: BTreeSet<HiddenApp>,
}

impl HiddenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, package: &str, class: &str) -> bool {
        self.entries
            .contains(&HiddenApp { package: package.to_string(), class: class.to_string() })
    }

    /// Returns true if the set changed.
    pub fn insert(&mut self, package: impl Into<String>, class: impl Into<String>) -> bool {
        self.entries.insert(HiddenApp { package: package.into(), class: class.into() })
    }

    /// Returns true if the set changed.
    pub fn remove(&mut self, package: &str, class: &str) -> bool {
        self.entries
            .remove(&HiddenApp { package: package.to_string(), class: class.to_string() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HiddenApp> {
        self.entries.iter()
    }
}

impl FromIterator<HiddenApp> for HiddenSet {
    fn from_iter<T: IntoIterator<Item = HiddenApp>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Reads and writes the hidden-app file.
pub struct HiddenAppStore {
    path: PathBuf,
}

impl HiddenAppStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the hidden set. An absent or unparsable file loads as empty.
    pub fn load(&self) -> HiddenSet {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return HiddenSet::default(),
        };
        match parse_hidden_xml(&content) {
            Ok(set) => set,
            Err(err) => {
                warn!("ignoring unparsable hidden-app file {:?}: {err}", self.path);
                HiddenSet::default()
            }
        }
    }

    /// Serializes the set, overwriting the previous file.
    pub fn save(&self, set: &HiddenSet) -> Result<(), ModelError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let xml = write_hidden_xml(set)?;
        fs::write(&self.path, xml)?;
        debug!("saved {} hidden apps to {:?}", set.len(), self.path);
        Ok(())
    }
}

fn parse_hidden_xml(content: &str) -> Result<HiddenSet, ModelError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut set = HiddenSet::default();
    let mut package = None;
    let mut class = None;
    let mut field: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"app" => {
                    package = None;
                    class = None;
                }
                b"componentPackage" => field = Some("package"),
                b"componentClass" => field = Some("class"),
                _ => field = None,
            },
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                match field {
                    Some("package") => package = Some(text),
                    Some("class") => class = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"app" => {
                    if let (Some(p), Some(c)) = (package.take(), class.take()) {
                        set.insert(p, c);
                    }
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(set)
}

fn write_hidden_xml(set: &HiddenSet) -> Result<Vec<u8>, ModelError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("apps")))?;
    for app in set.iter() {
        writer.write_event(Event::Start(BytesStart::new("app")))?;
        writer.write_event(Event::Start(BytesStart::new("componentPackage")))?;
        writer.write_event(Event::Text(BytesText::new(&app.package)))?;
        writer.write_event(Event::End(BytesEnd::new("componentPackage")))?;
        writer.write_event(Event::Start(BytesStart::new("componentClass")))?;
        writer.write_event(Event::Text(BytesText::new(&app.class)))?;
        writer.write_event(Event::End(BytesEnd::new("componentClass")))?;
        writer.write_event(Event::End(BytesEnd::new("app")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("apps")))?;
    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path) -> HiddenAppStore {
        HiddenAppStore::new(dir.join("hidden.xml"))
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roost-hidden-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = HiddenAppStore::new("/nonexistent/roost/hidden.xml");
        assert!(store.load().is_empty());
    }

    #[test]
    fn garbage_file_loads_empty() {
        let dir = temp_dir("garbage");
        let store = store_in(&dir);
        fs::write(store.path(), "<apps><app><componentPackage>x").unwrap();
        assert!(store.load().is_empty());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_trip_sizes() {
        let dir = temp_dir("roundtrip");
        let store = store_in(&dir);

        for n in [0usize, 1, 7] {
            let mut set = HiddenSet::new();
            for i in 0..n {
                set.insert(format!("org.example.app{i}"), format!("org.example.app{i}.Main"));
            }
            store.save(&set).unwrap();
            assert_eq!(store.load(), set, "round trip failed for {n} entries");
        }
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn insert_and_remove_are_idempotent() {
        let mut set = HiddenSet::new();
        assert!(set.insert("a", "a.Main"));
        assert!(!set.insert("a", "a.Main"));
        assert!(set.remove("a", "a.Main"));
        assert!(!set.remove("a", "a.Main"));
    }
}
