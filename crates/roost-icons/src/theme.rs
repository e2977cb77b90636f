//! Icon-theme resolution.
//!
//! A theme's `appfilter.xml` maps components to drawable names and declares
//! the optional compositing parts (back images, mask, upon overlay, scale).
//! Themes without a usable appfilter fall back to their `theme_iconpack` or
//! `icon_pack` string arrays, and finally to guessing from the drawable
//! names they ship. Resolution never fails: the worst case is a theme with
//! an empty mapping, which composes every icon from the default.

use std::collections::HashMap;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::source::ThemeSource;

/// A component as icon themes see it: profile-less, and sometimes only a
/// package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentRef {
    pub package: String,
    pub class: Option<String>,
}

impl ComponentRef {
    pub fn package(package: impl Into<String>) -> Self {
        Self { package: package.into(), class: None }
    }

    pub fn activity(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self { package: package.into(), class: Some(class.into()) }
    }

    /// `package/class` form, or bare `package`. Used in cache keys.
    pub fn flatten(&self) -> String {
        match &self.class {
            Some(class) => format!("{}/{class}", self.package),
            None => self.package.clone(),
        }
    }

    /// The package-level fallback ref for an activity ref.
    pub fn package_ref(&self) -> ComponentRef {
        ComponentRef::package(self.package.clone())
    }
}

/// Everything a theme declares: the component mapping plus compositing
/// parts, all by drawable name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThemeDescriptor {
    pub items: HashMap<ComponentRef, String>,
    pub backs: Vec<String>,
    pub mask: Option<String>,
    pub upon: Option<String>,
    pub scale: f32,
}

impl ThemeDescriptor {
    fn empty() -> Self {
        Self { scale: 1.0, ..Self::default() }
    }

    /// Looks a component up, falling back to its package-level entry.
    /// Mapping keys are stored lowercased, so the query is normalized the
    /// same way.
    pub fn drawable_for(&self, component: &ComponentRef) -> Option<&str> {
        let query = ComponentRef {
            package: component.package.to_lowercase(),
            class: component.class.as_deref().map(str::to_lowercase),
        };
        self.items
            .get(&query)
            .or_else(|| self.items.get(&query.package_ref()))
            .map(String::as_str)
    }
}

/// A resolved theme, ready to drive the repository.
#[derive(Clone, Debug, PartialEq)]
pub struct IconTheme {
    pub package: String,
    /// Built-in system theme, exempt from the external-theme cache naming.
    pub is_system: bool,
    pub descriptor: ThemeDescriptor,
}

impl IconTheme {
    /// The untouched-default pseudo theme.
    pub fn system_default() -> Self {
        Self {
            package: "default".to_string(),
            is_system: true,
            descriptor: ThemeDescriptor::empty(),
        }
    }
}

/// Resolves one theme package through the fallback chain.
pub fn resolve_theme(package: &str, source: &dyn ThemeSource) -> IconTheme {
    let mut descriptor = match source.open_asset("appfilter.xml") {
        Some(bytes) => match parse_appfilter(&bytes) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!("theme {package}: unparsable appfilter.xml: {err}");
                ThemeDescriptor::empty()
            }
        },
        None => ThemeDescriptor::empty(),
    };

    if descriptor.items.is_empty() {
        if let Some(names) = source
            .string_array("theme_iconpack")
            .or_else(|| source.string_array("icon_pack"))
        {
            debug!("theme {package}: no appfilter mapping, using string array");
            descriptor.items = expand_drawable_names(names.iter().map(String::as_str));
        }
    }

    if descriptor.items.is_empty() {
        debug!("theme {package}: falling back to drawable introspection");
        let names = source.drawable_names();
        descriptor.items = expand_drawable_names(names.iter().map(String::as_str));
    }

    IconTheme { package: package.to_string(), is_system: false, descriptor }
}

/// Derives component entries from bare drawable names: underscores become
/// dots, yielding a package entry and a package-prefixed activity entry
/// (`org_example_mail` maps both `org.example.mail` and
/// `org.example.mail/org.example.mail`).
fn expand_drawable_names<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<ComponentRef, String> {
    let mut items = HashMap::new();
    for name in names {
        if name.is_empty() {
            continue;
        }
        let dotted = name.replace('_', ".").to_lowercase();
        items
            .entry(ComponentRef::activity(dotted.clone(), dotted.clone()))
            .or_insert_with(|| name.to_string());
        items.entry(ComponentRef::package(dotted)).or_insert_with(|| name.to_string());
    }
    items
}

fn parse_appfilter(bytes: &[u8]) -> Result<ThemeDescriptor, crate::error::IconError> {
    let content = String::from_utf8_lossy(bytes);
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut descriptor = ThemeDescriptor::empty();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            // Appfilter elements are conventionally self-closing, but some
            // packs write open/close pairs; accept both.
            Event::Start(e) | Event::Empty(e) => handle_element(&e, &mut descriptor),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(descriptor)
}

fn handle_element(e: &BytesStart<'_>, descriptor: &mut ThemeDescriptor) {
    match e.name().as_ref() {
        b"iconback" => {
            // Any number of candidate backs, as img1, img2, ...
            for attr in e.attributes().flatten() {
                if attr.key.as_ref().starts_with(b"img") {
                    if let Ok(value) = attr.unescape_value() {
                        descriptor.backs.push(value.into_owned());
                    }
                }
            }
        }
        b"iconmask" => descriptor.mask = img1_attr(e),
        b"iconupon" => descriptor.upon = img1_attr(e),
        b"scale" => {
            if let Some(factor) = attr_value(e, b"factor") {
                match factor.parse::<f32>() {
                    Ok(scale) if scale > 0.0 => descriptor.scale = scale,
                    _ => warn!("ignoring bad scale factor {factor:?}"),
                }
            }
        }
        b"item" => {
            let (Some(component), Some(drawable)) =
                (attr_value(e, b"component"), attr_value(e, b"drawable"))
            else {
                return;
            };
            if let Some(component) = parse_component_info(&component) {
                // First writer wins on duplicate components.
                descriptor.items.entry(component).or_insert(drawable);
            }
        }
        _ => {}
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn img1_attr(e: &BytesStart<'_>) -> Option<String> {
    attr_value(e, b"img1")
}

/// Parses a `ComponentInfo{pkg/cls}` attribute, lowercased as published
/// packs expect. Entries without a `/` name a whole package.
fn parse_component_info(value: &str) -> Option<ComponentRef> {
    let value = value.to_lowercase();
    if !value.starts_with("componentinfo{") || !value.ends_with('}') || value.len() < 16 {
        return None;
    }
    let inner = &value[14..value.len() - 1];
    match inner.split_once('/') {
        Some((package, class)) if !package.is_empty() && !class.is_empty() => {
            Some(ComponentRef::activity(package, class))
        }
        Some(_) => None,
        None => Some(ComponentRef::package(inner)),
    }
}
