//! Persistent store for harvested groups and releases.

mod models;
mod schema;
mod sqlite_store;
mod trait_def;

pub use models::{
    name_key, DiscoveryMethod, Group, GroupProfile, HarvestRun, Quarantine, Release, ReleaseKind,
    RunOutcome,
};
pub use sqlite_store::SqliteHarvestStore;
pub use trait_def::{GroupFilter, GroupedCount, HarvestStore, ReleaseFilter, ReleaseGrouping};
