//! The asset surfaces an icon theme and the device expose to the resolver.

/// Read-only view of one installed icon theme's assets.
///
/// All lookups are by logical name; how the bytes are stored (apk assets,
/// a directory of files, a zip) is the implementor's business.
pub trait ThemeSource: Send + Sync {
    /// Raw bytes of a named asset file at the theme root, e.g.
    /// `appfilter.xml`.
    fn open_asset(&self, name: &str) -> Option<Vec<u8>>;

    /// A named string-array resource, if the theme defines one.
    fn string_array(&self, name: &str) -> Option<Vec<String>>;

    /// Names of every drawable the theme ships.
    fn drawable_names(&self) -> Vec<String>;

    /// Encoded image bytes for one drawable.
    fn load_drawable(&self, name: &str) -> Option<Vec<u8>>;
}

/// Supplies the unthemed default icon for a component.
pub trait DeviceIcons: Send + Sync {
    /// Encoded image bytes of the component's stock icon.
    fn default_icon(&self, component: &crate::theme::ComponentRef) -> Option<Vec<u8>>;
}
