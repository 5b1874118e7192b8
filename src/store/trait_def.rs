//! HarvestStore trait definition.
//!
//! Document-collection style contract over the `groups` and `releases`
//! collections: find by filter, insert, replace by id, delete by filter,
//! count, and grouping aggregation. Cascading deletes are two explicit calls.

use super::models::{DiscoveryMethod, Group, HarvestRun, Release, RunOutcome};
use anyhow::Result;

/// Conditions are ANDed; `None` means "don't care".
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub id: Option<i64>,
    pub external_id: Option<String>,
    /// Case-insensitive, trimmed name match.
    pub name: Option<String>,
    pub active: Option<bool>,
    pub has_external_id: Option<bool>,
    /// Active and either never quarantined or with a retry window ending at or
    /// before this timestamp.
    pub eligible_at: Option<i64>,
    /// Active with a pending retry window.
    pub quarantined: Option<bool>,
    /// Inactive since strictly before this timestamp.
    pub inactive_before: Option<i64>,
}

impl GroupFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_external_id(external_id: &str) -> Self {
        Self {
            external_id: Some(external_id.to_string()),
            ..Default::default()
        }
    }

    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn eligible(now: i64) -> Self {
        Self {
            eligible_at: Some(now),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseFilter {
    pub id: Option<i64>,
    pub external_id: Option<String>,
    pub group_id: Option<i64>,
    /// Case-insensitive, trimmed name match.
    pub name: Option<String>,
    /// Case-insensitive match against any of these names.
    pub name_in: Option<Vec<String>>,
    pub discovery_method: Option<DiscoveryMethod>,
}

impl ReleaseFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_external_id(external_id: &str) -> Self {
        Self {
            external_id: Some(external_id.to_string()),
            ..Default::default()
        }
    }

    pub fn by_group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }
}

/// Key a release aggregation is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseGrouping {
    DiscoveryMethod,
    ReleaseKind,
    /// Grouped by owning group; the key is the group's name.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GroupedCount {
    pub key: String,
    pub count: u64,
}

pub trait HarvestStore: Send + Sync {
    // =========================================================================
    // Groups
    // =========================================================================

    fn find_group(&self, filter: &GroupFilter) -> Result<Option<Group>>;

    /// Matching groups in ascending id order.
    fn find_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>>;

    /// Inserts `group` ignoring its `id`; returns the assigned id.
    fn insert_group(&self, group: &Group) -> Result<i64>;

    /// Overwrites every column of the row with `group.id`.
    fn replace_group(&self, group: &Group) -> Result<()>;

    fn delete_groups(&self, filter: &GroupFilter) -> Result<usize>;

    fn count_groups(&self, filter: &GroupFilter) -> Result<u64>;

    // =========================================================================
    // Releases
    // =========================================================================

    fn find_release(&self, filter: &ReleaseFilter) -> Result<Option<Release>>;

    /// Matching releases in ascending id order.
    fn find_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>>;

    fn insert_release(&self, release: &Release) -> Result<i64>;

    fn replace_release(&self, release: &Release) -> Result<()>;

    fn delete_releases(&self, filter: &ReleaseFilter) -> Result<usize>;

    fn count_releases(&self, filter: &ReleaseFilter) -> Result<u64>;

    /// Release counts grouped by `grouping`, largest first, ties by key.
    fn count_releases_grouped(
        &self,
        grouping: ReleaseGrouping,
        limit: Option<usize>,
    ) -> Result<Vec<GroupedCount>>;

    // =========================================================================
    // Run history
    // =========================================================================

    fn record_run_start(&self, mode: &str, started_at: i64) -> Result<i64>;

    fn record_run_finish(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        finished_at: i64,
        stats_json: &str,
    ) -> Result<()>;

    fn last_run(&self) -> Result<Option<HarvestRun>>;
}
