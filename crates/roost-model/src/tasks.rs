//! The incremental update tasks enqueued in response to package events.
//!
//! Each task is one committed catalog mutation followed by one bind of the
//! resulting delta. Unknown packages and empty payloads degrade to no-ops.

use log::{debug, warn};

use crate::catalog::AppEntry;
use crate::hidden::HiddenSet;
use crate::key::{ComponentKey, UserId};
use crate::scheduler::{TaskContext, UpdateTask};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageOp {
    Add,
    Update,
    Remove,
    /// Package's storage went away without an uninstall (ejected media).
    Unavailable,
    Suspend,
    Unsuspend,
}

/// Applies one package-level change to the catalog.
pub struct PackageUpdatedTask {
    pub op: PackageOp,
    pub user: UserId,
    pub packages: Vec<String>,
}

impl UpdateTask for PackageUpdatedTask {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        let user = self.user;
        let mut delta = crate::catalog::CatalogDelta::default();
        match self.op {
            PackageOp::Add | PackageOp::Update => {
                for package in &self.packages {
                    let fresh: Vec<AppEntry> = ctx
                        .source
                        .package_activities(user, package)
                        .into_iter()
                        .map(|a| {
                            AppEntry::new(
                                ComponentKey::new(a.package, a.class, user),
                                a.title,
                                a.install_time,
                            )
                        })
                        .collect();
                    if fresh.is_empty() && self.op == PackageOp::Add {
                        debug!("ignoring add for {package}: no launchable activities");
                        continue;
                    }
                    // Activities the update removed must go away too.
                    let keep: std::collections::HashSet<&ComponentKey> =
                        fresh.iter().map(|e| &e.key).collect();
                    let removed = ctx.state.catalog.remove_matching(|key| {
                        key.package == *package && key.user == user && !keep.contains(key)
                    });
                    let upserted = ctx.state.catalog.upsert(fresh);
                    delta.added.extend(upserted.added);
                    delta.updated.extend(upserted.updated);
                    delta.removed.extend(removed.removed);
                }
            }
            PackageOp::Remove | PackageOp::Unavailable => {
                delta = ctx.state.catalog.remove_matching(|key| {
                    self.packages.iter().any(|p| *p == key.package) && key.user == user
                });
            }
            PackageOp::Suspend | PackageOp::Unsuspend => {
                let suspended = self.op == PackageOp::Suspend;
                delta = ctx.state.catalog.update_matching(
                    |entry| {
                        entry.key.user == user
                            && self.packages.iter().any(|p| *p == entry.key.package)
                            && entry.suspended != suspended
                    },
                    |entry| entry.suspended = suspended,
                );
            }
        }
        ctx.bind_delta(&delta);
    }
}

/// Replaces the deep shortcuts published by one package.
pub struct ShortcutsChangedTask {
    pub user: UserId,
    pub package: String,
    pub shortcuts: Vec<(ComponentKey, String)>,
}

impl UpdateTask for ShortcutsChangedTask {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        ctx.state
            .workspace
            .update_package_shortcuts(&self.package, self.user, self.shortcuts);
        let map = ctx.state.workspace.deep_shortcuts().clone();
        ctx.dispatch_catalog(move |o| o.on_shortcuts_bound(&map));
    }
}

/// Invalidates cached icon handles after an icon-cache regeneration.
pub struct IconsUpdatedTask {
    pub user: UserId,
    pub packages: Vec<String>,
}

impl UpdateTask for IconsUpdatedTask {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        let user = self.user;
        let delta = ctx.state.catalog.update_matching(
            |entry| {
                entry.key.user == user && self.packages.iter().any(|p| *p == entry.key.package)
            },
            |entry| {
                entry.icon = None;
                entry.dirty = true;
            },
        );
        ctx.bind_delta(&delta);
    }
}

/// Persists a new hidden set and swaps it into the catalog.
pub struct HiddenSetChangedTask {
    pub hidden: HiddenSet,
}

impl UpdateTask for HiddenSetChangedTask {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        if let Err(err) = ctx.hidden_store.save(&self.hidden) {
            // The in-memory set still applies this session.
            warn!("failed to persist hidden-app set: {err}");
        }
        ctx.state.catalog.apply_hidden_set(self.hidden);
    }
}

/// Handles a profile becoming available or unavailable (work profile turned
/// off, user storage locked).
pub struct UserAvailabilityTask {
    pub user: UserId,
    pub available: bool,
}

impl UpdateTask for UserAvailabilityTask {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        let user = self.user;
        let delta = if self.available {
            let entries: Vec<AppEntry> = ctx
                .source
                .activities(user)
                .into_iter()
                .map(|a| {
                    AppEntry::new(
                        ComponentKey::new(a.package, a.class, user),
                        a.title,
                        a.install_time,
                    )
                })
                .collect();
            ctx.state.catalog.upsert(entries)
        } else {
            ctx.state.catalog.remove_matching(|key| key.user == user)
        };
        ctx.bind_delta(&delta);
    }
}
