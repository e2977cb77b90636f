//! The icon repository: per-component themed-icon lookup.
//!
//! Lookup order for a component under the active theme:
//!
//! 1. a drawable the theme maps for the component (exact, then package),
//! 2. a previously composited icon in the disk cache,
//! 3. compose the device's default icon with the theme's back/mask/upon
//!    parts and cache the result.
//!
//! Decode and I/O failures degrade to the plain default icon rather than
//! erroring out of a lookup.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use log::{debug, info, warn};
use rand::seq::SliceRandom;

use crate::cache::IconDiskCache;
use crate::source::{DeviceIcons, ThemeSource};
use crate::theme::{ComponentRef, IconTheme};

/// The active theme with its compositing parts decoded once.
struct ActiveTheme {
    theme: IconTheme,
    source: Option<Box<dyn ThemeSource>>,
    backs: Vec<RgbaImage>,
    mask: Option<RgbaImage>,
    upon: Option<RgbaImage>,
}

impl ActiveTheme {
    fn system_default() -> Self {
        Self {
            theme: IconTheme::system_default(),
            source: None,
            backs: Vec::new(),
            mask: None,
            upon: None,
        }
    }

    /// Composition needs a back image; mask/upon alone leave the default
    /// icon untouched.
    fn composites(&self) -> bool {
        !self.backs.is_empty()
    }

    fn load_drawable(&self, name: &str) -> Option<RgbaImage> {
        let bytes = self.source.as_ref()?.load_drawable(name)?;
        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                warn!("theme {}: undecodable drawable {name:?}: {err}", self.theme.package);
                None
            }
        }
    }
}

pub struct IconRepository {
    device: Arc<dyn DeviceIcons>,
    cache: IconDiskCache,
    active: ActiveTheme,
}

impl IconRepository {
    pub fn new(device: Arc<dyn DeviceIcons>, cache: IconDiskCache) -> Self {
        Self { device, cache, active: ActiveTheme::system_default() }
    }

    pub fn active_theme(&self) -> &IconTheme {
        &self.active.theme
    }

    /// Activates a resolved theme, decoding its compositing parts up front.
    /// Switching away from a different theme invalidates the disk cache.
    pub fn set_theme(&mut self, theme: IconTheme, source: Option<Box<dyn ThemeSource>>) {
        if theme.package != self.active.theme.package {
            self.cache.clear();
        }
        let mut active =
            ActiveTheme { theme, source, backs: Vec::new(), mask: None, upon: None };
        let descriptor = active.theme.descriptor.clone();
        for name in &descriptor.backs {
            match active.load_drawable(name) {
                Some(img) => active.backs.push(img),
                None => warn!("theme {}: missing back image {name:?}", active.theme.package),
            }
        }
        active.mask = descriptor.mask.as_deref().and_then(|n| active.load_drawable(n));
        active.upon = descriptor.upon.as_deref().and_then(|n| active.load_drawable(n));
        info!(
            "activated icon theme {} ({} mapped components, {} backs)",
            active.theme.package,
            descriptor.items.len(),
            active.backs.len()
        );
        self.active = active;
    }

    /// Resets to the untouched device icons and drops the cache.
    pub fn reset_theme(&mut self) {
        self.cache.clear();
        self.active = ActiveTheme::system_default();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolves the themed icon for one component.
    pub fn icon_for(&self, component: &ComponentRef) -> Option<RgbaImage> {
        if let Some(name) = self.active.theme.descriptor.drawable_for(component) {
            if let Some(icon) = self.active.load_drawable(name) {
                return Some(icon);
            }
            debug!(
                "theme {} maps {} to unloadable drawable {name:?}, composing instead",
                self.active.theme.package,
                component.flatten()
            );
        }

        if self.active.composites() {
            if let Some(icon) = self.cache.get(&self.active.theme.package, component) {
                return Some(icon);
            }
        }

        let default = self.default_icon(component)?;
        if !self.active.composites() {
            return Some(default);
        }

        let back = self.active.backs.choose(&mut rand::thread_rng());
        let composed = crate::compose::compose(
            &default,
            back,
            self.active.mask.as_ref(),
            self.active.upon.as_ref(),
            self.active.theme.descriptor.scale,
        );
        self.cache.put(&self.active.theme.package, component, &composed);
        Some(composed)
    }

    /// Ensures the themed icon exists on disk and returns its path, the
    /// handle catalog entries carry.
    pub fn materialize(&self, component: &ComponentRef) -> Option<PathBuf> {
        let path = self.cache.path_for(&self.active.theme.package, component);
        if path.exists() {
            return Some(path);
        }
        let icon = self.icon_for(component)?;
        // The composite path already wrote the file; only mapped drawables
        // and plain defaults still need encoding.
        if !path.exists() {
            self.cache.put(&self.active.theme.package, component, &icon);
        }
        path.exists().then_some(path)
    }

    fn default_icon(&self, component: &ComponentRef) -> Option<RgbaImage> {
        let bytes = self.device.default_icon(component)?;
        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                warn!("undecodable default icon for {}: {err}", component.flatten());
                None
            }
        }
    }
}
