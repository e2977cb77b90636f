//! Launcher data model: app catalog, update scheduling, and the sectioned
//! app-list projection.
//!
//! The crate is built around three pieces:
//!
//! * [`AppCatalog`] — the canonical in-memory map of installed launchable
//!   activities, keyed by [`ComponentKey`].
//! * [`ModelUpdateScheduler`] — a single background worker that serializes
//!   every catalog mutation (incremental package events and cancellable full
//!   reloads) and dispatches owned snapshots to observers.
//! * [`SectionedProjection`] — a pure function from catalog plus
//!   [`ProjectionParams`] to the flattened, sectioned item list a UI renders,
//!   with merge policies and fast-scroll anchors.
//!
//! Hidden apps ([`HiddenSet`], persisted by [`HiddenAppStore`]) filter the
//! projection without ever deleting catalog entries.

pub mod catalog;
pub mod error;
pub mod hidden;
pub mod indexer;
pub mod key;
pub mod observer;
pub mod projection;
pub mod scheduler;
pub mod source;
pub mod tasks;
pub mod workspace;

pub use catalog::{AppCatalog, AppEntry, CatalogDelta};
pub use error::ModelError;
pub use hidden::{HiddenApp, HiddenAppStore, HiddenSet};
pub use indexer::{LatinIndexer, SectionIndexer, SectionNameCache};
pub use key::{ComponentKey, UserId};
pub use observer::{
    CallbackDispatcher, CatalogObserver, InlineDispatcher, Observers, ProjectionObserver,
};
pub use projection::{
    AdapterItem, AdapterItemKind, FastScrollAnchor, FastScrollDistribution, FillRowsMerge,
    MergePolicy, NoMerge, ProjectionParams, SectionInfo, SectionedProjection, SortMode,
};
pub use scheduler::{
    ModelState, ModelUpdateScheduler, SchedulerConfig, TaskContext, UpdateTask,
};
pub use source::{InstalledActivity, PackageEvent, PackageSource};
pub use tasks::{
    HiddenSetChangedTask, IconsUpdatedTask, PackageOp, PackageUpdatedTask, ShortcutsChangedTask,
    UserAvailabilityTask,
};
pub use workspace::{WidgetEntry, WorkspaceItem, WorkspaceModel, WorkspaceScreen};
