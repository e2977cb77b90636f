//! Roost - launcher model host
//!
//! Wires the filesystem-backed device into the model scheduler and icon
//! repository, runs a full reload, and prints the sectioned app list.
//! With `--watch` it keeps running and applies package-manifest changes
//! incrementally.

mod device;
mod watcher;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

use roost_icons::{ComponentRef, IconDiskCache, IconRepository, resolve_theme};
use roost_model::{
    AdapterItemKind, AppEntry, CatalogObserver, HiddenAppStore, InlineDispatcher,
    ModelUpdateScheduler, Observers, ProjectionObserver, ProjectionParams, SchedulerConfig,
    SectionedProjection, TaskContext,
};

use device::FsDevice;

struct CliArgs {
    data_dir: std::path::PathBuf,
    theme: Option<String>,
    watch: bool,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut data_dir = None;
    let mut theme = None;
    let mut watch = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--theme" => theme = Some(args.next().ok_or("--theme needs a package name")?),
            "--watch" => watch = true,
            "--help" | "-h" => {
                return Err("usage: roost <data-dir> [--theme <package>] [--watch]".to_string());
            }
            _ if data_dir.is_none() => data_dir = Some(arg.into()),
            other => return Err(format!("unexpected argument {other:?}")),
        }
    }
    Ok(CliArgs {
        data_dir: data_dir.ok_or("usage: roost <data-dir> [--theme <package>] [--watch]")?,
        theme,
        watch,
    })
}

/// Logs bind callbacks and prints each recomputed projection.
#[derive(Default)]
struct ConsoleObserver {
    reloads: AtomicU64,
}

impl CatalogObserver for ConsoleObserver {
    fn on_catalog_bound(&self, entries: &[AppEntry]) {
        info!("catalog bound: {} entries", entries.len());
    }

    fn on_entries_added(&self, added: &[AppEntry]) {
        for entry in added {
            info!("added {}", entry.key);
        }
    }

    fn on_entries_removed(&self, removed: &[roost_model::ComponentKey]) {
        for key in removed {
            info!("removed {key}");
        }
    }

    fn on_reload_complete(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        info!("reload complete");
    }
}

impl ProjectionObserver for ConsoleObserver {
    fn on_projection_changed(&self, projection: &SectionedProjection) {
        println!("--- {} apps, {} rows ---", projection.num_apps(), projection.num_app_rows);
        for item in &projection.items {
            match &item.kind {
                AdapterItemKind::SectionBreak => {
                    println!("[{}]", item.section_name);
                }
                AdapterItemKind::App(entry) | AdapterItemKind::PredictedApp(entry) => {
                    println!("  {:<24} {}", entry.title, entry.key);
                }
                AdapterItemKind::SearchDivider => println!("  ----"),
                AdapterItemKind::MarketSearch => println!("  (search the store)"),
                AdapterItemKind::EmptySearch => println!("  (no results)"),
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let device = Arc::new(FsDevice::new(&args.data_dir));
    let cache_root = dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("roost");
    let mut icons = IconRepository::new(device.clone(), IconDiskCache::new(cache_root));
    if let Some(theme) = &args.theme {
        let source = device.theme_source(theme);
        let resolved = resolve_theme(theme, &source);
        info!("theme {theme}: {} mapped components", resolved.descriptor.items.len());
        icons.set_theme(resolved, Some(Box::new(source)));
    }
    let icons = Arc::new(icons);

    let observer = Arc::new(ConsoleObserver::default());
    let scheduler = Arc::new(ModelUpdateScheduler::spawn(SchedulerConfig {
        source: device.clone(),
        hidden_store: HiddenAppStore::new(args.data_dir.join("hidden.xml")),
        dispatcher: Arc::new(InlineDispatcher),
        observers: Observers::new()
            .with_catalog(observer.clone())
            .with_projection(observer.clone()),
        params: ProjectionParams::new(4),
    }));

    scheduler.request_reload();

    // Materialize themed icons for everything the reload brought in.
    let icons_task = icons.clone();
    scheduler.enqueue(move |ctx: &mut TaskContext<'_>| {
        ctx.state.catalog.update_matching(
            |entry| entry.icon.is_none() || entry.dirty,
            |entry| {
                let component =
                    ComponentRef::activity(entry.key.package.clone(), entry.key.class.clone());
                entry.icon = icons_task.materialize(&component);
                entry.dirty = false;
            },
        );
    });
    scheduler.wait_idle();

    if args.watch {
        let _watcher = watcher::watch_packages(&device.packages_dir(), scheduler.clone())?;
        info!("watching {:?}", device.packages_dir());
        loop {
            std::thread::park();
        }
    }
    Ok(())
}
