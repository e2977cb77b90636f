//! Maps filesystem changes in the packages directory to model events.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use roost_model::{ModelUpdateScheduler, PackageEvent, UserId};

use crate::device::manifest_package_name;

/// Watches `packages/*.json` and forwards add/change/remove events to the
/// scheduler. The returned watcher must stay alive for as long as events
/// should flow.
pub fn watch_packages(
    dir: &Path,
    scheduler: Arc<ModelUpdateScheduler>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => forward(&event, &scheduler),
        Err(err) => warn!("package watcher error: {err}"),
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn forward(event: &Event, scheduler: &ModelUpdateScheduler) {
    for path in &event.paths {
        let Some(package) = manifest_package_name(path) else {
            continue;
        };
        let user = UserId(0);
        let mapped = match event.kind {
            EventKind::Create(_) => PackageEvent::PackageAdded { user, package },
            EventKind::Modify(_) => PackageEvent::PackageChanged { user, package },
            EventKind::Remove(_) => PackageEvent::PackageRemoved { user, package },
            _ => continue,
        };
        debug!("package manifest event: {mapped:?}");
        scheduler.handle_event(mapped);
    }
}
