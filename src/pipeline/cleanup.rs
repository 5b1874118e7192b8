use super::context::PipelineContext;
use super::stats::CleanupStats;
use crate::classifier::PLACEHOLDER_RELEASE_NAMES;
use crate::quarantine::purge_inactive;
use crate::store::ReleaseFilter;
use anyhow::Result;
use tracing::info;

/// Deletes releases stored under placeholder names and purges groups that
/// have been inactive past the retention window.
pub fn run_cleanup(ctx: &PipelineContext) -> Result<CleanupStats> {
    let placeholders = ctx.store.delete_releases(&ReleaseFilter {
        name_in: Some(
            PLACEHOLDER_RELEASE_NAMES
                .iter()
                .map(|n| n.to_string())
                .collect(),
        ),
        ..Default::default()
    })? as u64;

    let purged = purge_inactive(
        ctx.store.as_ref(),
        ctx.settings.quarantine.inactive_retention_days,
        ctx.now(),
    )?;

    info!(
        "Cleanup: {} placeholder releases deleted, {} inactive groups purged",
        placeholders, purged
    );
    Ok(CleanupStats {
        placeholder_releases_deleted: placeholders,
        inactive_groups_purged: purged,
    })
}
