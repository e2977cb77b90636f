//! Disk cache for composited icons.
//!
//! Files are named `{theme}_{sha256(component)}.png` under `icons/` in the
//! cache root, so switching themes never collides and one component always
//! maps to the same file.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::theme::ComponentRef;

pub struct IconDiskCache {
    root: PathBuf,
}

impl IconDiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, theme: &str, component: &ComponentRef) -> PathBuf {
        let digest = Sha256::digest(component.flatten().as_bytes());
        self.icons_dir().join(format!("{theme}_{}.png", hex::encode(digest)))
    }

    fn icons_dir(&self) -> PathBuf {
        self.root.join("icons")
    }

    /// Returns the cached icon, treating any read or decode failure as a
    /// miss.
    pub fn get(&self, theme: &str, component: &ComponentRef) -> Option<RgbaImage> {
        let path = self.path_for(theme, component);
        let bytes = fs::read(&path).ok()?;
        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                warn!("discarding corrupt cached icon {path:?}: {err}");
                fs::remove_file(&path).ok();
                None
            }
        }
    }

    /// Stores a composited icon. Failures are logged and dropped; the cache
    /// is an optimization, not a source of truth.
    pub fn put(&self, theme: &str, component: &ComponentRef, icon: &RgbaImage) {
        let path = self.path_for(theme, component);
        if let Err(err) = self.try_put(&path, icon) {
            warn!("failed to cache icon {path:?}: {err}");
        }
    }

    fn try_put(&self, path: &Path, icon: &RgbaImage) -> Result<(), crate::error::IconError> {
        fs::create_dir_all(self.icons_dir())?;
        icon.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Deletes every cached icon, e.g. on theme switch.
    pub fn clear(&self) {
        let dir = self.icons_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let mut removed = 0usize;
        for entry in entries.flatten() {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) => warn!("failed to remove cached icon {:?}: {err}", entry.path()),
            }
        }
        debug!("cleared {removed} cached icons from {dir:?}");
    }
}
