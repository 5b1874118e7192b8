//! Idempotent writes of harvested groups and releases.

use super::merge::ReconciledRelease;
use crate::store::{
    Group, GroupFilter, GroupProfile, HarvestStore, Release, ReleaseFilter, ReleaseKind,
};
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Finds the stored group for `profile`: by external id when it has one,
/// then by case-insensitive name.
pub fn find_existing_group(
    store: &dyn HarvestStore,
    profile: &GroupProfile,
) -> Result<Option<Group>> {
    if let Some(external_id) = &profile.external_id {
        if let Some(group) = store.find_group(&GroupFilter::by_external_id(external_id))? {
            return Ok(Some(group));
        }
    }
    store.find_group(&GroupFilter::by_name(&profile.name))
}

/// Writes `profile` as the group's provider data. An existing record keeps its
/// id, `created_at`, lifecycle state and (when none is given) its discovery
/// source; everything else is overwritten and `updated_at` becomes `now`.
pub fn upsert_group(
    store: &dyn HarvestStore,
    profile: &GroupProfile,
    discovery_source: Option<&str>,
    now: i64,
) -> Result<UpsertOutcome> {
    match find_existing_group(store, profile)? {
        Some(existing) => {
            let updated = Group {
                profile: profile.clone(),
                discovery_source: discovery_source
                    .map(String::from)
                    .or(existing.discovery_source.clone()),
                updated_at: now,
                ..existing
            };
            store.replace_group(&updated)?;
            Ok(UpsertOutcome::Updated(updated.id))
        }
        None => {
            let group = Group::new(profile.clone(), discovery_source.map(String::from), now);
            let id = store.insert_group(&group)?;
            debug!("Created group {} ({})", profile.name, id);
            Ok(UpsertOutcome::Created(id))
        }
    }
}

fn release_document(group_id: i64, reconciled: &ReconciledRelease, now: i64) -> Release {
    let album = &reconciled.album;
    Release {
        id: 0,
        external_id: Some(album.id.clone()),
        group_id,
        name: album.name.trim().to_string(),
        release_date: album
            .release_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from),
        track_count: album.total_tracks,
        release_kind: ReleaseKind::from_track_count(album.total_tracks),
        discovery_method: reconciled.discovery_method,
        provider_url: album.provider_url(),
        image_url: album.image_url(),
        created_at: now,
        updated_at: now,
    }
}

/// Only the owning group's rows can match: a release listed by two groups is
/// stored once per group.
fn find_existing_release(store: &dyn HarvestStore, release: &Release) -> Result<Option<Release>> {
    let filter = match &release.external_id {
        Some(external_id) => ReleaseFilter {
            group_id: Some(release.group_id),
            external_id: Some(external_id.clone()),
            ..Default::default()
        },
        None => ReleaseFilter {
            group_id: Some(release.group_id),
            name: Some(release.name.clone()),
            ..Default::default()
        },
    };
    store.find_release(&filter)
}

pub fn upsert_release(
    store: &dyn HarvestStore,
    group_id: i64,
    reconciled: &ReconciledRelease,
    now: i64,
) -> Result<UpsertOutcome> {
    let document = release_document(group_id, reconciled, now);
    match find_existing_release(store, &document)? {
        Some(existing) => {
            let updated = Release {
                id: existing.id,
                created_at: existing.created_at,
                ..document
            };
            store.replace_release(&updated)?;
            Ok(UpsertOutcome::Updated(existing.id))
        }
        None => Ok(UpsertOutcome::Created(store.insert_release(&document)?)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSetChanges {
    pub created: u64,
    pub updated: u64,
    pub pruned: u64,
}

/// Replaces the stored release set of `group_id` with `reconciled`.
///
/// Every reconciled release is upserted, then stored releases of the group
/// that are not part of the set are deleted. An empty set is treated as "no
/// data" and leaves the stored releases alone.
pub fn refresh_release_set(
    store: &dyn HarvestStore,
    group_id: i64,
    reconciled: &[ReconciledRelease],
    now: i64,
) -> Result<ReleaseSetChanges> {
    let mut changes = ReleaseSetChanges::default();
    if reconciled.is_empty() {
        return Ok(changes);
    }

    let mut kept: HashSet<i64> = HashSet::with_capacity(reconciled.len());
    for release in reconciled {
        let outcome = upsert_release(store, group_id, release, now)?;
        if outcome.is_created() {
            changes.created += 1;
        } else {
            changes.updated += 1;
        }
        kept.insert(outcome.id());
    }

    for stale in store
        .find_releases(&ReleaseFilter::by_group(group_id))?
        .into_iter()
        .filter(|r| !kept.contains(&r.id))
    {
        debug!("Pruning release {} ({}) of group {}", stale.name, stale.id, group_id);
        changes.pruned += store.delete_releases(&ReleaseFilter::by_id(stale.id))? as u64;
    }

    Ok(changes)
}
