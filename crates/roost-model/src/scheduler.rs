//! Single-worker task queue serializing all model mutations.
//!
//! One dedicated background thread owns the catalog, the workspace state and
//! the projection inputs. Every mutation arrives as an [`UpdateTask`] on a
//! FIFO channel, so no two mutations interleave and the catalog needs no
//! internal locking. The UI side only enqueues requests and receives owned
//! snapshots through the injected [`CallbackDispatcher`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, error, info};

use crate::catalog::{AppCatalog, AppEntry, CatalogDelta};
use crate::hidden::HiddenAppStore;
use crate::indexer::SectionNameCache;
use crate::key::ComponentKey;
use crate::observer::{CallbackDispatcher, CatalogObserver, Observers};
use crate::projection::{ProjectionParams, SectionedProjection};
use crate::source::{PackageEvent, PackageSource};
use crate::tasks::{
    HiddenSetChangedTask, IconsUpdatedTask, PackageOp, PackageUpdatedTask, ShortcutsChangedTask,
    UserAvailabilityTask,
};
use crate::workspace::WorkspaceModel;

/// All model state owned by the worker thread.
pub struct ModelState {
    pub catalog: AppCatalog,
    pub workspace: WorkspaceModel,
    pub params: ProjectionParams,
    pub section_cache: SectionNameCache,
    projection_dirty: bool,
}

impl ModelState {
    fn new(params: ProjectionParams) -> Self {
        Self {
            catalog: AppCatalog::new(),
            workspace: WorkspaceModel::new(),
            params,
            section_cache: SectionNameCache::new(),
            projection_dirty: false,
        }
    }
}

/// Execution environment handed to each task on the worker thread.
pub struct TaskContext<'a> {
    pub state: &'a mut ModelState,
    pub source: &'a Arc<dyn PackageSource>,
    pub hidden_store: &'a HiddenAppStore,
    observers: &'a Observers,
    dispatcher: &'a Arc<dyn CallbackDispatcher>,
}

impl TaskContext<'_> {
    /// Forces a projection recomputation even when the catalog generation
    /// did not move (e.g. after a parameter change).
    pub fn invalidate_projection(&mut self) {
        self.state.projection_dirty = true;
    }

    /// Dispatches the added/updated/removed portions of a committed delta.
    pub fn bind_delta(&self, delta: &CatalogDelta) {
        if !delta.added.is_empty() {
            let added = delta.added.clone();
            self.dispatch_catalog(move |o| o.on_entries_added(&added));
        }
        if !delta.updated.is_empty() {
            let updated = delta.updated.clone();
            self.dispatch_catalog(move |o| o.on_entries_updated(&updated));
        }
        if !delta.removed.is_empty() {
            let removed = delta.removed.clone();
            self.dispatch_catalog(move |o| o.on_entries_removed(&removed));
        }
    }

    pub fn dispatch_catalog<F>(&self, callback: F)
    where
        F: Fn(&dyn CatalogObserver) + Send + 'static,
    {
        dispatch_catalog(self.observers, self.dispatcher, callback);
    }
}

fn dispatch_catalog<F>(observers: &Observers, dispatcher: &Arc<dyn CallbackDispatcher>, callback: F)
where
    F: Fn(&dyn CatalogObserver) + Send + 'static,
{
    if observers.catalog.is_empty() {
        return;
    }
    let targets = observers.catalog.clone();
    dispatcher.dispatch(Box::new(move || {
        for observer in &targets {
            callback(observer.as_ref());
        }
    }));
}

/// A unit of work run on the scheduler's worker.
pub trait UpdateTask: Send {
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>);
}

impl<F> UpdateTask for F
where
    F: FnOnce(&mut TaskContext<'_>) + Send,
{
    fn run(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        (*self)(ctx)
    }
}

enum Job {
    Task(Box<dyn UpdateTask>),
    Reload(u64),
    Barrier(Sender<()>),
    Shutdown,
}

struct Shared {
    /// Serial of the most recently requested full reload. A running reload
    /// compares its own serial against this at every stage boundary.
    reload_serial: AtomicU64,
    loaded: AtomicBool,
}

/// Everything the scheduler worker needs, supplied by the composition root.
pub struct SchedulerConfig {
    pub source: Arc<dyn PackageSource>,
    pub hidden_store: HiddenAppStore,
    pub dispatcher: Arc<dyn CallbackDispatcher>,
    pub observers: Observers,
    pub params: ProjectionParams,
}

pub struct ModelUpdateScheduler {
    tx: Sender<Job>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ModelUpdateScheduler {
    pub fn spawn(config: SchedulerConfig) -> Self {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            reload_serial: AtomicU64::new(0),
            loaded: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("roost-model".to_string())
            .spawn(move || worker_loop(rx, config, worker_shared))
            .expect("failed to spawn model worker thread");
        Self { tx, shared, worker: Some(worker) }
    }

    /// True once a full reload has completed and no newer one was requested.
    pub fn is_loaded(&self) -> bool {
        self.shared.loaded.load(Ordering::SeqCst)
    }

    pub fn enqueue(&self, task: impl UpdateTask + 'static) {
        let _ = self.tx.send(Job::Task(Box::new(task)));
    }

    /// Enqueues a task mutating the projection parameters (sort mode, grid
    /// width, predicted apps, search filter, ...). The projection is
    /// recomputed afterwards.
    pub fn update_params<F>(&self, update: F)
    where
        F: FnOnce(&mut ProjectionParams) + Send + 'static,
    {
        self.enqueue(move |ctx: &mut TaskContext<'_>| {
            update(&mut ctx.state.params);
            ctx.invalidate_projection();
        });
    }

    /// Requests a full reload, cancelling any reload already in flight.
    pub fn request_reload(&self) {
        self.shared.loaded.store(false, Ordering::SeqCst);
        let serial = self.shared.reload_serial.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.tx.send(Job::Reload(serial));
    }

    /// Maps one external event to exactly one enqueued task (or a reload).
    pub fn handle_event(&self, event: PackageEvent) {
        match event {
            PackageEvent::PackageAdded { user, package } => self.enqueue(PackageUpdatedTask {
                op: PackageOp::Add,
                user,
                packages: vec![package],
            }),
            PackageEvent::PackageChanged { user, package } => self.enqueue(PackageUpdatedTask {
                op: PackageOp::Update,
                user,
                packages: vec![package],
            }),
            PackageEvent::PackageRemoved { user, package } => self.enqueue(PackageUpdatedTask {
                op: PackageOp::Remove,
                user,
                packages: vec![package],
            }),
            PackageEvent::PackagesAvailable { user, packages, .. } => {
                self.enqueue(PackageUpdatedTask { op: PackageOp::Update, user, packages })
            }
            PackageEvent::PackagesUnavailable { user, packages, replacing } => {
                // A package being replaced comes right back; ignore.
                if !replacing {
                    self.enqueue(PackageUpdatedTask {
                        op: PackageOp::Unavailable,
                        user,
                        packages,
                    })
                }
            }
            PackageEvent::PackagesSuspended { user, packages } => {
                self.enqueue(PackageUpdatedTask { op: PackageOp::Suspend, user, packages })
            }
            PackageEvent::PackagesUnsuspended { user, packages } => {
                self.enqueue(PackageUpdatedTask { op: PackageOp::Unsuspend, user, packages })
            }
            PackageEvent::ShortcutsChanged { user, package, shortcuts } => {
                self.enqueue(ShortcutsChangedTask { user, package, shortcuts })
            }
            PackageEvent::IconsUpdated { user, packages } => {
                self.enqueue(IconsUpdatedTask { user, packages })
            }
            PackageEvent::ProfileAvailabilityChanged { user, available } => {
                self.enqueue(UserAvailabilityTask { user, available })
            }
            PackageEvent::ProfileUnlocked { user } => {
                self.enqueue(UserAvailabilityTask { user, available: true })
            }
            PackageEvent::ProfileAdded { .. }
            | PackageEvent::ProfileRemoved { .. }
            | PackageEvent::LocaleChanged => self.request_reload(),
        }
    }

    pub fn update_hidden_set(&self, hidden: crate::hidden::HiddenSet) {
        self.enqueue(HiddenSetChangedTask { hidden });
    }

    /// Blocks until every job enqueued before this call has run.
    pub fn wait_idle(&self) {
        let (tx, rx) = bounded(1);
        if self.tx.send(Job::Barrier(tx)).is_ok() {
            let _ = rx.recv();
        }
    }
}

impl Drop for ModelUpdateScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The worker's environment, split out of [`SchedulerConfig`] so the
/// projection parameters can move into [`ModelState`].
struct WorkerEnv {
    source: Arc<dyn PackageSource>,
    hidden_store: HiddenAppStore,
    dispatcher: Arc<dyn CallbackDispatcher>,
    observers: Observers,
}

fn worker_loop(rx: Receiver<Job>, config: SchedulerConfig, shared: Arc<Shared>) {
    let SchedulerConfig { source, hidden_store, dispatcher, observers, params } = config;
    let env = WorkerEnv { source, hidden_store, dispatcher, observers };
    let mut state = ModelState::new(params);
    state.catalog.apply_hidden_set(env.hidden_store.load());
    let mut bound_generation = state.catalog.generation();

    while let Ok(job) = rx.recv() {
        match job {
            Job::Shutdown => break,
            Job::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
            Job::Task(task) => {
                let mut ctx = TaskContext {
                    state: &mut state,
                    source: &env.source,
                    hidden_store: &env.hidden_store,
                    observers: &env.observers,
                    dispatcher: &env.dispatcher,
                };
                // A misbehaving task must not take the queue down with it.
                if catch_unwind(AssertUnwindSafe(|| task.run(&mut ctx))).is_err() {
                    error!("model update task panicked; continuing with next task");
                }
            }
            Job::Reload(serial) => {
                if !run_reload(serial, &mut state, &env, &shared) {
                    // A superseded reload must stay silent; the newer one
                    // recomputes the projection right after this job.
                    state.projection_dirty = false;
                    bound_generation = state.catalog.generation();
                    continue;
                }
            }
        }

        if state.catalog.generation() != bound_generation || state.projection_dirty {
            state.projection_dirty = false;
            bound_generation = state.catalog.generation();
            let projection =
                SectionedProjection::compute(&state.catalog, &state.params, &mut state.section_cache);
            if !env.observers.projection.is_empty() {
                let targets = env.observers.projection.clone();
                env.dispatcher.dispatch(Box::new(move || {
                    for observer in &targets {
                        observer.on_projection_changed(&projection);
                    }
                }));
            }
        }
    }
    debug!("model worker exiting");
}

/// Runs the staged full reload. Catalog replacement and each bind stage are
/// commit points; the stop check between them is how a superseded reload
/// abandons itself without corrupting anything. Returns false when the
/// reload observed cancellation.
fn run_reload(serial: u64, state: &mut ModelState, env: &WorkerEnv, shared: &Shared) -> bool {
    let cancelled = || shared.reload_serial.load(Ordering::SeqCst) != serial;
    if cancelled() {
        debug!("reload {serial} superseded before start");
        return false;
    }

    // Enumerate every profile and replace the catalog wholesale.
    let mut entries = Vec::new();
    for user in env.source.profiles() {
        for activity in env.source.activities(user) {
            entries.push(AppEntry::new(
                ComponentKey::new(activity.package, activity.class, user),
                activity.title,
                activity.install_time,
            ));
        }
    }
    if cancelled() {
        debug!("reload {serial} superseded during scan");
        return false;
    }
    state.catalog.apply_hidden_set(env.hidden_store.load());
    state.catalog.replace_all(entries);

    // Stage: bind workspace layout.
    state.workspace.replace_screens(env.source.workspace_screens());
    if cancelled() {
        return false;
    }
    let screens = state.workspace.screens().to_vec();
    dispatch_catalog(&env.observers, &env.dispatcher, move |o| {
        o.on_workspace_bound(&screens)
    });

    // Stage: bind the catalog.
    if cancelled() {
        return false;
    }
    let mut snapshot = state.catalog.snapshot();
    snapshot.sort_by(|a, b| a.key.cmp(&b.key));
    dispatch_catalog(&env.observers, &env.dispatcher, move |o| {
        o.on_catalog_bound(&snapshot)
    });

    // Stage: bind the deep-shortcut map.
    let mut shortcut_map = std::collections::HashMap::new();
    for user in env.source.profiles() {
        for (key, id) in env.source.deep_shortcuts(user) {
            shortcut_map.entry(key).or_insert_with(Vec::new).push(id);
        }
    }
    state.workspace.set_deep_shortcuts(shortcut_map.clone());
    if cancelled() {
        return false;
    }
    dispatch_catalog(&env.observers, &env.dispatcher, move |o| {
        o.on_shortcuts_bound(&shortcut_map)
    });

    // Stage: bind widgets.
    state.workspace.set_widgets(env.source.widgets());
    if cancelled() {
        return false;
    }
    let widgets = state.workspace.widgets().to_vec();
    dispatch_catalog(&env.observers, &env.dispatcher, move |o| {
        o.on_widgets_bound(&widgets)
    });

    if cancelled() {
        return false;
    }
    shared.loaded.store(true, Ordering::SeqCst);
    info!("reload {serial} complete: {} entries", state.catalog.len());
    dispatch_catalog(&env.observers, &env.dispatcher, |o| o.on_reload_complete());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidden::HiddenSet;
    use crate::key::UserId;
    use crate::observer::{InlineDispatcher, ProjectionObserver};
    use crate::source::InstalledActivity;
    use crate::workspace::WorkspaceScreen;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct FakeSource {
        activities: Mutex<Vec<InstalledActivity>>,
    }

    impl FakeSource {
        fn new(activities: Vec<InstalledActivity>) -> Arc<Self> {
            Arc::new(Self { activities: Mutex::new(activities) })
        }
    }

    impl PackageSource for FakeSource {
        fn profiles(&self) -> Vec<UserId> {
            vec![UserId(0)]
        }

        fn activities(&self, _user: UserId) -> Vec<InstalledActivity> {
            self.activities.lock().unwrap().clone()
        }
    }

    fn activity(pkg: &str, t: i64) -> InstalledActivity {
        InstalledActivity {
            package: pkg.to_string(),
            class: format!("{pkg}.Main"),
            title: pkg.to_string(),
            install_time: t,
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        catalog_binds: AtomicUsize,
        reload_completes: AtomicUsize,
    }

    impl CatalogObserver for RecordingObserver {
        fn on_catalog_bound(&self, _entries: &[AppEntry]) {
            self.catalog_binds.fetch_add(1, Ordering::SeqCst);
        }

        fn on_reload_complete(&self) {
            self.reload_completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn temp_store(name: &str) -> HiddenAppStore {
        HiddenAppStore::new(
            std::env::temp_dir().join(format!("roost-sched-{name}-{}.xml", std::process::id())),
        )
    }

    fn spawn_with(
        source: Arc<dyn PackageSource>,
        observer: Arc<RecordingObserver>,
        store: HiddenAppStore,
    ) -> ModelUpdateScheduler {
        ModelUpdateScheduler::spawn(SchedulerConfig {
            source,
            hidden_store: store,
            dispatcher: Arc::new(InlineDispatcher),
            observers: Observers::new().with_catalog(observer),
            params: ProjectionParams::new(4),
        })
    }

    #[test]
    fn tasks_run_fifo_and_see_previous_effects() {
        let source = FakeSource::new(vec![]);
        let observer = Arc::new(RecordingObserver::default());
        let scheduler = spawn_with(source, observer, temp_store("fifo"));

        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let log = Arc::clone(&log);
            scheduler.enqueue(move |ctx: &mut TaskContext<'_>| {
                // Each task observes the count left behind by its predecessor.
                log.lock().unwrap().push((i, ctx.state.catalog.len()));
                ctx.state.catalog.upsert(vec![AppEntry::new(
                    ComponentKey::new(format!("pkg{i}"), "Main", UserId(0)),
                    format!("pkg{i}"),
                    i,
                )]);
            });
        }
        scheduler.wait_idle();

        let log = log.lock().unwrap();
        let expected: Vec<(i64, usize)> = (0..10).map(|i| (i, i as usize)).collect();
        assert_eq!(*log, expected);
    }

    #[test]
    fn superseded_reload_binds_nothing_and_loads_once() {
        let source = FakeSource::new(vec![activity("a", 1), activity("b", 2)]);
        let observer = Arc::new(RecordingObserver::default());
        let scheduler = spawn_with(source, Arc::clone(&observer), temp_store("cancel"));

        // Hold the worker so both reload requests land before either runs.
        let (hold_tx, hold_rx) = bounded::<()>(0);
        scheduler.enqueue(move |_ctx: &mut TaskContext<'_>| {
            let _ = hold_rx.recv();
        });
        scheduler.request_reload();
        scheduler.request_reload();
        hold_tx.send(()).unwrap();
        scheduler.wait_idle();

        // The first reload saw a newer serial at its first stage check and
        // abandoned itself silently.
        assert!(scheduler.is_loaded());
        assert_eq!(observer.catalog_binds.load(Ordering::SeqCst), 1);
        assert_eq!(observer.reload_completes.load(Ordering::SeqCst), 1);
    }

    /// Blocks inside the workspace stage until released, so a test can
    /// supersede a reload that already replaced the catalog.
    struct StagedSource {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl PackageSource for StagedSource {
        fn profiles(&self) -> Vec<UserId> {
            vec![UserId(0)]
        }

        fn activities(&self, _user: UserId) -> Vec<InstalledActivity> {
            vec![activity("a", 1)]
        }

        fn workspace_screens(&self) -> Vec<WorkspaceScreen> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Vec::new()
        }
    }

    #[derive(Default)]
    struct ProjectionCounter {
        count: AtomicUsize,
    }

    impl ProjectionObserver for ProjectionCounter {
        fn on_projection_changed(&self, _projection: &SectionedProjection) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn superseded_reload_emits_no_projection_callback() {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let source = Arc::new(StagedSource { entered: entered_tx, release: release_rx });
        let observer = Arc::new(RecordingObserver::default());
        let projections = Arc::new(ProjectionCounter::default());
        let scheduler = ModelUpdateScheduler::spawn(SchedulerConfig {
            source,
            hidden_store: temp_store("stage-cancel"),
            dispatcher: Arc::new(InlineDispatcher),
            observers: Observers::new()
                .with_catalog(observer.clone())
                .with_projection(projections.clone()),
            params: ProjectionParams::new(4),
        });

        scheduler.request_reload();
        // The first reload has replaced the catalog and sits in the
        // workspace stage; supersede it there, then let it resume.
        entered_rx.recv().unwrap();
        scheduler.request_reload();
        release_tx.send(()).unwrap();
        entered_rx.recv().unwrap();
        release_tx.send(()).unwrap();
        scheduler.wait_idle();

        assert!(scheduler.is_loaded());
        // Only the reload that ran to completion announced anything.
        assert_eq!(projections.count.load(Ordering::SeqCst), 1);
        assert_eq!(observer.reload_completes.load(Ordering::SeqCst), 1);
        assert_eq!(observer.catalog_binds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_does_not_stall_the_queue() {
        let source = FakeSource::new(vec![]);
        let observer = Arc::new(RecordingObserver::default());
        let scheduler = spawn_with(source, observer, temp_store("panic"));

        scheduler.enqueue(|_ctx: &mut TaskContext<'_>| panic!("boom"));
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        scheduler.enqueue(move |_ctx: &mut TaskContext<'_>| {
            ran_clone.store(true, Ordering::SeqCst);
        });
        scheduler.wait_idle();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn hidden_set_change_round_trips_through_store() {
        let source = FakeSource::new(vec![activity("a", 1)]);
        let observer = Arc::new(RecordingObserver::default());
        let store = temp_store("hidden");
        let store_path = store.path().to_path_buf();
        let scheduler = spawn_with(source, observer, store);

        scheduler.request_reload();
        let mut hidden = HiddenSet::new();
        hidden.insert("a", "a.Main");
        scheduler.update_hidden_set(hidden.clone());
        scheduler.wait_idle();

        assert_eq!(HiddenAppStore::new(&store_path).load(), hidden);
        std::fs::remove_file(store_path).ok();
    }
}
