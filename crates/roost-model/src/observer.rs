//! Observer interfaces and the executor abstraction callbacks are
//! dispatched through.
//!
//! The model never talks to a UI directly: the worker hands owned payloads
//! to a [`CallbackDispatcher`], which the embedder points at its main
//! thread. Observers are narrow and default-empty, so a consumer implements
//! only what it cares about and must tolerate empty payloads.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::AppEntry;
use crate::key::ComponentKey;
use crate::projection::SectionedProjection;
use crate::workspace::{WidgetEntry, WorkspaceScreen};

/// Runs model callbacks on the thread the embedder chooses.
pub trait CallbackDispatcher: Send + Sync {
    fn dispatch(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks directly on the worker thread. Suitable for headless
/// consumers and tests.
#[derive(Debug, Default)]
pub struct InlineDispatcher;

impl CallbackDispatcher for InlineDispatcher {
    fn dispatch(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

/// Bind sequence for catalog and workspace state. Invoked after the
/// producing mutation is fully committed.
pub trait CatalogObserver: Send + Sync {
    fn on_workspace_bound(&self, _screens: &[WorkspaceScreen]) {}
    fn on_catalog_bound(&self, _entries: &[AppEntry]) {}
    fn on_entries_added(&self, _added: &[AppEntry]) {}
    fn on_entries_updated(&self, _updated: &[AppEntry]) {}
    fn on_entries_removed(&self, _removed: &[ComponentKey]) {}
    fn on_shortcuts_bound(&self, _shortcuts: &HashMap<ComponentKey, Vec<String>>) {}
    fn on_widgets_bound(&self, _widgets: &[WidgetEntry]) {}
    fn on_reload_complete(&self) {}
}

pub trait ProjectionObserver: Send + Sync {
    fn on_projection_changed(&self, projection: &SectionedProjection);
}

#[derive(Clone, Default)]
pub struct Observers {
    pub catalog: Vec<Arc<dyn CatalogObserver>>,
    pub projection: Vec<Arc<dyn ProjectionObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, observer: Arc<dyn CatalogObserver>) -> Self {
        self.catalog.push(observer);
        self
    }

    pub fn with_projection(mut self, observer: Arc<dyn ProjectionObserver>) -> Self {
        self.projection.push(observer);
        self
    }
}
