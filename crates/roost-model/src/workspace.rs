//! Workspace-layout, deep-shortcut and widget payloads carried through the
//! staged reload.

use std::collections::HashMap;

use log::error;

use crate::key::ComponentKey;

/// One pinned item on a workspace screen.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceItem {
    pub id: u64,
    pub key: ComponentKey,
    pub title: String,
    pub cell: (u32, u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceScreen {
    pub id: u64,
    pub items: Vec<WorkspaceItem>,
}

/// An installable widget provider.
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetEntry {
    pub package: String,
    pub provider: String,
    pub label: String,
    pub spans: (u8, u8),
}

/// Workspace-side model state owned by the scheduler worker.
#[derive(Debug, Default)]
pub struct WorkspaceModel {
    screens: Vec<WorkspaceScreen>,
    items_by_id: HashMap<u64, WorkspaceItem>,
    deep_shortcuts: HashMap<ComponentKey, Vec<String>>,
    widgets: Vec<WidgetEntry>,
    invariant_violations: u64,
}

impl WorkspaceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screens(&self) -> &[WorkspaceScreen] {
        &self.screens
    }

    pub fn deep_shortcuts(&self) -> &HashMap<ComponentKey, Vec<String>> {
        &self.deep_shortcuts
    }

    pub fn widgets(&self) -> &[WidgetEntry] {
        &self.widgets
    }

    pub fn replace_screens(&mut self, screens: Vec<WorkspaceScreen>) {
        self.items_by_id = screens
            .iter()
            .flat_map(|s| s.items.iter())
            .map(|i| (i.id, i.clone()))
            .collect();
        self.screens = screens;
    }

    pub fn set_deep_shortcuts(&mut self, map: HashMap<ComponentKey, Vec<String>>) {
        self.deep_shortcuts = map;
    }

    /// Replaces the shortcut lists contributed by one package/profile,
    /// leaving other packages untouched.
    pub fn update_package_shortcuts(
        &mut self,
        package: &str,
        user: crate::key::UserId,
        shortcuts: Vec<(ComponentKey, String)>,
    ) {
        self.deep_shortcuts
            .retain(|key, _| !(key.package == package && key.user == user));
        for (key, id) in shortcuts {
            self.deep_shortcuts.entry(key).or_default().push(id);
        }
    }

    pub fn set_widgets(&mut self, widgets: Vec<WidgetEntry>) {
        self.widgets = widgets;
    }

    /// Verifies that a caller-supplied item still matches the model's record.
    ///
    /// A mismatch is an invariant violation: it is logged and counted, but it
    /// never takes the process down. Returns false on mismatch.
    pub fn check_item(&mut self, item: &WorkspaceItem) -> bool {
        match self.items_by_id.get(&item.id) {
            None => true,
            Some(model_item) if model_item == item => true,
            Some(model_item) => {
                error!(
                    "workspace item {} diverged from model: caller has {:?} / {:?}, \
                     model has {:?} / {:?}",
                    item.id, item.key, item.cell, model_item.key, model_item.cell
                );
                self.invariant_violations += 1;
                false
            }
        }
    }

    pub fn invariant_violations(&self) -> u64 {
        self.invariant_violations
    }
}
