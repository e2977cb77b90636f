//! Icon-theme engine: resolve a theme's component mapping, composite themed
//! icons from back/mask/upon parts, and keep the results in a disk cache.
//!
//! [`resolve_theme`] turns a theme package into an [`IconTheme`] through a
//! fallback chain (appfilter, string arrays, drawable introspection) that
//! never fails. [`IconRepository`] owns the active theme and answers
//! per-component lookups.

pub mod cache;
pub mod compose;
pub mod error;
pub mod repo;
pub mod source;
pub mod theme;

pub use cache::IconDiskCache;
pub use compose::compose;
pub use error::IconError;
pub use repo::IconRepository;
pub use source::{DeviceIcons, ThemeSource};
pub use theme::{ComponentRef, IconTheme, ThemeDescriptor, resolve_theme};
