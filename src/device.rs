//! Filesystem-backed device: package manifests and icon-theme assets read
//! from a data directory.
//!
//! Layout under the data root:
//!
//! ```text
//! packages/<package>.json        one manifest per installed package
//! themes/<theme>/appfilter.xml   theme assets
//! themes/<theme>/arrays.json     string-array resources
//! themes/<theme>/drawables/*.png
//! hidden.xml                     hidden-app store
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;
use walkdir::WalkDir;

use roost_icons::{ComponentRef, DeviceIcons, ThemeSource};
use roost_model::{InstalledActivity, PackageSource, UserId};

#[derive(Debug, Deserialize)]
struct ActivityManifest {
    class: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    package: String,
    #[serde(default)]
    installed_at: i64,
    #[serde(default = "default_users")]
    users: Vec<u32>,
    activities: Vec<ActivityManifest>,
    /// Stock icon file, relative to the data root.
    icon: Option<String>,
}

fn default_users() -> Vec<u32> {
    vec![0]
}

/// The launcher's view of the machine: packages and themes as files.
pub struct FsDevice {
    root: PathBuf,
}

impl FsDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn theme_source(&self, theme: &str) -> FsThemeSource {
        FsThemeSource { dir: self.root.join("themes").join(theme) }
    }

    fn manifests(&self) -> Vec<PackageManifest> {
        let entries = match fs::read_dir(self.packages_dir()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("cannot read {:?}: {err}", self.packages_dir());
                return Vec::new();
            }
        };
        let mut manifests = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|content| {
                serde_json::from_str::<PackageManifest>(&content).map_err(|e| e.to_string())
            }) {
                Ok(manifest) => manifests.push(manifest),
                Err(err) => warn!("skipping unreadable package manifest {path:?}: {err}"),
            }
        }
        manifests
    }
}

impl PackageSource for FsDevice {
    fn profiles(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> =
            self.manifests().iter().flat_map(|m| m.users.iter().copied().map(UserId)).collect();
        users.sort();
        users.dedup();
        if users.is_empty() {
            users.push(UserId(0));
        }
        users
    }

    fn activities(&self, user: UserId) -> Vec<InstalledActivity> {
        self.manifests()
            .into_iter()
            .filter(|m| m.users.contains(&user.0))
            .flat_map(|m| {
                m.activities
                    .into_iter()
                    .map(|a| InstalledActivity {
                        package: m.package.clone(),
                        class: a.class,
                        title: a.title,
                        install_time: m.installed_at,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl DeviceIcons for FsDevice {
    fn default_icon(&self, component: &ComponentRef) -> Option<Vec<u8>> {
        let icon = self
            .manifests()
            .into_iter()
            .find(|m| m.package == component.package)
            .and_then(|m| m.icon)?;
        fs::read(self.root.join(icon)).ok()
    }
}

/// One theme directory exposed through the [`ThemeSource`] surface.
pub struct FsThemeSource {
    dir: PathBuf,
}

impl ThemeSource for FsThemeSource {
    fn open_asset(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.dir.join(name)).ok()
    }

    fn string_array(&self, name: &str) -> Option<Vec<String>> {
        let content = fs::read_to_string(self.dir.join("arrays.json")).ok()?;
        let arrays: HashMap<String, Vec<String>> = match serde_json::from_str(&content) {
            Ok(arrays) => arrays,
            Err(err) => {
                warn!("unparsable {:?}: {err}", self.dir.join("arrays.json"));
                return None;
            }
        };
        arrays.get(name).cloned()
    }

    fn drawable_names(&self) -> Vec<String> {
        WalkDir::new(self.dir.join("drawables"))
            .max_depth(1)
            .into_iter()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect()
    }

    fn load_drawable(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.dir.join("drawables").join(format!("{name}.png"))).ok()
    }
}

pub fn manifest_package_name(path: &Path) -> Option<String> {
    if path.extension().is_none_or(|e| e != "json") {
        return None;
    }
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_device(name: &str) -> (FsDevice, PathBuf) {
        let root = std::env::temp_dir().join(format!("roost-dev-{name}-{}", std::process::id()));
        fs::create_dir_all(root.join("packages")).unwrap();
        (FsDevice::new(&root), root)
    }

    const MAIL: &str = r#"{
        "package": "org.example.mail",
        "installed_at": 1700000000000,
        "users": [0, 10],
        "activities": [
            {"class": "org.example.mail.Inbox", "title": "Mail"},
            {"class": "org.example.mail.Compose", "title": "Compose"}
        ],
        "icon": "stock/mail.png"
    }"#;

    #[test]
    fn manifests_feed_profiles_and_activities() {
        let (device, root) = temp_device("manifests");
        fs::write(root.join("packages/org.example.mail.json"), MAIL).unwrap();
        fs::write(root.join("packages/broken.json"), "{nope").unwrap();
        fs::write(root.join("packages/notes.txt"), "ignored").unwrap();

        assert_eq!(device.profiles(), vec![UserId(0), UserId(10)]);
        let mut activities = device.activities(UserId(10));
        activities.sort_by(|a, b| a.class.cmp(&b.class));
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[1].class, "org.example.mail.Inbox");
        assert_eq!(activities[1].install_time, 1_700_000_000_000);
        assert!(device.activities(UserId(11)).is_empty());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn default_icon_reads_relative_to_root() {
        let (device, root) = temp_device("icon");
        fs::write(root.join("packages/org.example.mail.json"), MAIL).unwrap();
        fs::create_dir_all(root.join("stock")).unwrap();
        fs::write(root.join("stock/mail.png"), b"png bytes").unwrap();

        let bytes = device.default_icon(&ComponentRef::package("org.example.mail"));
        assert_eq!(bytes.as_deref(), Some(&b"png bytes"[..]));
        assert!(device.default_icon(&ComponentRef::package("ghost")).is_none());
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn theme_source_surfaces_assets_arrays_and_drawables() {
        let (device, root) = temp_device("theme");
        let theme_dir = root.join("themes/org.pack");
        fs::create_dir_all(theme_dir.join("drawables")).unwrap();
        fs::write(theme_dir.join("appfilter.xml"), "<resources/>").unwrap();
        fs::write(theme_dir.join("arrays.json"), r#"{"icon_pack": ["org_example_mail"]}"#)
            .unwrap();
        fs::write(theme_dir.join("drawables/org_example_mail.png"), b"img").unwrap();
        fs::write(theme_dir.join("drawables/readme.txt"), b"skip").unwrap();

        let source = device.theme_source("org.pack");
        assert!(source.open_asset("appfilter.xml").is_some());
        assert_eq!(source.string_array("icon_pack").unwrap(), vec!["org_example_mail"]);
        assert!(source.string_array("missing").is_none());
        assert_eq!(source.drawable_names(), vec!["org_example_mail"]);
        assert_eq!(source.load_drawable("org_example_mail").as_deref(), Some(&b"img"[..]));
        fs::remove_dir_all(root).ok();
    }
}
