//! Multi-source merge and idempotent persistence of harvested entities.

mod merge;
mod upsert;

pub use merge::{reconcile_releases, ReconciledRelease, ReleaseDate};
pub use upsert::{
    find_existing_group, refresh_release_set, upsert_group, upsert_release, ReleaseSetChanges,
    UpsertOutcome,
};
