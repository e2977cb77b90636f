//! The package-manager surface the model consumes, and the events it reacts
//! to. The real launcher gets these from the OS; tests use in-memory fakes.

use crate::key::{ComponentKey, UserId};
use crate::workspace::{WidgetEntry, WorkspaceScreen};

/// One installed launchable activity as reported by the device.
#[derive(Clone, Debug, PartialEq)]
pub struct InstalledActivity {
    pub package: String,
    pub class: String,
    pub title: String,
    /// First-install timestamp, epoch milliseconds.
    pub install_time: i64,
}

/// Enumeration surface over installed packages and profiles.
///
/// Only the narrow query surface the model needs: list profiles, list
/// launchable activities, and the workspace/shortcut/widget payloads bound
/// during a full reload. All methods are called from the scheduler worker.
pub trait PackageSource: Send + Sync {
    fn profiles(&self) -> Vec<UserId>;

    fn activities(&self, user: UserId) -> Vec<InstalledActivity>;

    fn package_activities(&self, user: UserId, package: &str) -> Vec<InstalledActivity> {
        self.activities(user).into_iter().filter(|a| a.package == package).collect()
    }

    fn workspace_screens(&self) -> Vec<WorkspaceScreen> {
        Vec::new()
    }

    fn deep_shortcuts(&self, _user: UserId) -> Vec<(ComponentKey, String)> {
        Vec::new()
    }

    fn widgets(&self) -> Vec<WidgetEntry> {
        Vec::new()
    }
}

/// External package/profile events. Each maps to exactly one enqueued
/// update-task (or a full-reload request) in
/// [`ModelUpdateScheduler::handle_event`](crate::scheduler::ModelUpdateScheduler::handle_event).
#[derive(Clone, Debug, PartialEq)]
pub enum PackageEvent {
    PackageAdded { user: UserId, package: String },
    PackageChanged { user: UserId, package: String },
    PackageRemoved { user: UserId, package: String },
    PackagesAvailable { user: UserId, packages: Vec<String>, replacing: bool },
    PackagesUnavailable { user: UserId, packages: Vec<String>, replacing: bool },
    PackagesSuspended { user: UserId, packages: Vec<String> },
    PackagesUnsuspended { user: UserId, packages: Vec<String> },
    ShortcutsChanged { user: UserId, package: String, shortcuts: Vec<(ComponentKey, String)> },
    /// Icons for these packages were regenerated in the icon cache.
    IconsUpdated { user: UserId, packages: Vec<String> },
    ProfileAdded { user: UserId },
    ProfileRemoved { user: UserId },
    ProfileAvailabilityChanged { user: UserId, available: bool },
    ProfileUnlocked { user: UserId },
    LocaleChanged,
}
