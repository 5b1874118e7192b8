//! Release harvesting for known groups.

use super::context::PipelineContext;
use super::stats::{PhaseReport, StopReason};
use crate::classifier::classify;
use crate::error::{HarvestError, HarvestResult};
use crate::provider::AlbumObject;
use crate::quarantine::{record_event, QuarantineEvent, QuarantineState};
use crate::reconcile::{reconcile_releases, refresh_release_set, ReleaseSetChanges};
use crate::store::{Group, GroupFilter};
use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupHarvest {
    pub authoritative: usize,
    pub search: usize,
    pub rejected: u64,
    pub changes: ReleaseSetChanges,
}

/// Harvests and persists the release set of one group: the authoritative
/// listing plus owned search results, classified, merged and written with
/// pruning. Serves both freshly discovered and existing groups.
pub fn harvest_group(ctx: &PipelineContext, group: &Group) -> HarvestResult<GroupHarvest> {
    let external_id = group.external_id().ok_or_else(|| HarvestError::Upstream {
        status: None,
        message: format!("Group {} has no external id", group.id),
    })?;

    let mut rejected = 0;
    let mut authoritative = Vec::new();
    for page in ctx.provider.artist_releases(external_id) {
        for album in page?.items {
            if classify(&album, &ctx.rules).accept {
                authoritative.push(album);
            } else {
                rejected += 1;
            }
        }
    }

    let (search, search_rejected) = match collect_search_releases(ctx, group, external_id) {
        Ok(found) => found,
        Err(e) if e.is_run_fatal() || matches!(e, HarvestError::Auth(_)) => return Err(e),
        Err(e) => {
            warn!(
                "Release search failed for {}, keeping authoritative listing only: {}",
                group.name(),
                e
            );
            (Vec::new(), 0)
        }
    };
    rejected += search_rejected;

    let counts = (authoritative.len(), search.len());
    let reconciled = reconcile_releases(authoritative, search, external_id);
    let changes = refresh_release_set(ctx.store.as_ref(), group.id, &reconciled, ctx.now())
        .map_err(HarvestError::persistence)?;

    debug!(
        "Harvested {}: {} authoritative, {} search, {} kept",
        group.name(),
        counts.0,
        counts.1,
        reconciled.len()
    );
    Ok(GroupHarvest {
        authoritative: counts.0,
        search: counts.1,
        rejected,
        changes,
    })
}

/// Valid, owned search results, bounded by the configured limit and cut short
/// after a run of pages that contribute nothing.
fn collect_search_releases(
    ctx: &PipelineContext,
    group: &Group,
    owner_external_id: &str,
) -> HarvestResult<(Vec<AlbumObject>, u64)> {
    let limit = ctx.settings.discovery.search_release_limit;
    let max_barren = ctx.settings.discovery.max_barren_pages;
    let mut found = Vec::new();
    let mut rejected = 0;
    let mut barren_pages = 0;

    if limit == 0 {
        return Ok((found, rejected));
    }

    for page in ctx.provider.search_releases_by_artist(group.name()) {
        let page = page?;
        let mut page_found = 0;
        for album in page.items {
            if album.primary_artist_id() != Some(owner_external_id) {
                continue;
            }
            if !classify(&album, &ctx.rules).accept {
                rejected += 1;
                continue;
            }
            found.push(album);
            page_found += 1;
            if found.len() >= limit {
                return Ok((found, rejected));
            }
        }

        if page_found == 0 {
            barren_pages += 1;
            if barren_pages >= max_barren {
                debug!(
                    "Stopping release search for {} after {} barren pages",
                    group.name(),
                    barren_pages
                );
                break;
            }
        } else {
            barren_pages = 0;
        }
    }
    Ok((found, rejected))
}

/// Quarantines `group` after a rate-limit abort.
pub(crate) fn quarantine_rate_limited(ctx: &PipelineContext, group: &Group) -> bool {
    match record_event(
        ctx.store.as_ref(),
        group,
        QuarantineEvent::RateLimited,
        ctx.now(),
        ctx.settings.quarantine.retry_window_secs(),
    ) {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to quarantine group {}: {:#}", group.name(), e);
            false
        }
    }
}

/// Returns a group whose retry window has run out to active after a
/// successful harvest.
pub(crate) fn release_from_quarantine(ctx: &PipelineContext, group: &Group) {
    if !matches!(
        QuarantineState::of(group),
        QuarantineState::QuarantinedRetryable { .. }
    ) {
        return;
    }
    if let Err(e) = record_event(
        ctx.store.as_ref(),
        group,
        QuarantineEvent::Recovered,
        ctx.now(),
        ctx.settings.quarantine.retry_window_secs(),
    ) {
        error!("Failed to clear quarantine of {}: {:#}", group.name(), e);
    }
}

/// Harvests every eligible group with an external id, in id order.
/// Groups in `already_harvested` are skipped.
pub fn run_completion(
    ctx: &PipelineContext,
    already_harvested: &HashSet<i64>,
) -> Result<PhaseReport> {
    let groups = ctx.store.find_groups(&GroupFilter::eligible(ctx.now()))?;
    let mut report = PhaseReport::default();

    info!("Completion: {} eligible groups", groups.len());

    let mut first_unit = true;
    for group in &groups {
        if ctx.is_cancelled() {
            report.stopped = Some(StopReason::Cancelled);
            break;
        }
        if already_harvested.contains(&group.id) || group.external_id().is_none() {
            report.stats.skipped += 1;
            continue;
        }

        if !first_unit {
            ctx.pace(ctx.settings.pacing.completion_delay);
        }
        first_unit = false;
        report.stats.processed += 1;

        match harvest_group(ctx, group) {
            Ok(harvest) => {
                report.stats.harvested += 1;
                report.stats.releases.absorb(harvest.changes);
                report.stats.releases.rejected += harvest.rejected;
                release_from_quarantine(ctx, group);
                debug!(
                    "Completed {}: +{} ~{} -{}",
                    group.name(),
                    harvest.changes.created,
                    harvest.changes.updated,
                    harvest.changes.pruned
                );
            }
            Err(HarvestError::RateLimitExceeded { wait_secs }) => {
                warn!(
                    "Rate limit of {}s while completing {}; aborting run",
                    wait_secs,
                    group.name()
                );
                if quarantine_rate_limited(ctx, group) {
                    report.stats.quarantined += 1;
                }
                report.stopped = Some(StopReason::RateLimited { wait_secs });
                break;
            }
            Err(e) => {
                warn!("Failed to complete {}: {}", group.name(), e);
                report.stats.failed += 1;
            }
        }
    }

    info!(
        "Completion done: {} processed, {} failed, {} releases created, {} updated, {} pruned",
        report.stats.processed,
        report.stats.failed,
        report.stats.releases.created,
        report.stats.releases.updated,
        report.stats.releases.pruned
    );
    Ok(report)
}
