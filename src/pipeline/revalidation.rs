//! Re-checks stored groups against the provider and drives their quarantine
//! state.

use super::completion::quarantine_rate_limited;
use super::context::PipelineContext;
use super::stats::{PhaseReport, StopReason};
use crate::classifier::name_similarity;
use crate::error::{HarvestError, HarvestResult};
use crate::provider::ArtistObject;
use crate::quarantine::{
    record_event, QuarantineEvent, REASON_MISSING_EXTERNAL_ID, REASON_NAME_MISMATCH,
    REASON_NOT_FOUND, REASON_NOT_IN_DOMAIN,
};
use crate::store::{Group, GroupFilter};
use anyhow::Result;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum Verdict {
    /// The provider still knows the group and it still belongs to the domain.
    Valid(ArtistObject),
    Invalid(&'static str),
}

/// Looks the group up by external id and applies the domain-genre and
/// name-similarity checks. A 404 is a verdict, not an error.
pub fn revalidate_group(ctx: &PipelineContext, group: &Group) -> HarvestResult<Verdict> {
    let Some(external_id) = group.external_id() else {
        return Ok(Verdict::Invalid(REASON_MISSING_EXTERNAL_ID));
    };

    let artist = match ctx.provider.get_artist(external_id) {
        Ok(artist) => artist,
        Err(HarvestError::NotFound) => return Ok(Verdict::Invalid(REASON_NOT_FOUND)),
        Err(e) => return Err(e),
    };

    if !ctx.rules.has_domain_genre(&artist.genres) {
        debug!("{} genres {:?} are out of domain", group.name(), artist.genres);
        return Ok(Verdict::Invalid(REASON_NOT_IN_DOMAIN));
    }

    let similarity = name_similarity(group.name(), &artist.name);
    if similarity < ctx.settings.quarantine.similarity_threshold {
        debug!(
            "{} != {} (similarity {:.2})",
            group.name(),
            artist.name,
            similarity
        );
        return Ok(Verdict::Invalid(REASON_NAME_MISMATCH));
    }

    Ok(Verdict::Valid(artist))
}

/// Writes the verdict: a valid group gets fresh provider fields and a cleared
/// quarantine, an invalid one becomes inactive.
fn apply_verdict(ctx: &PipelineContext, group: &Group, verdict: Verdict) -> Result<bool> {
    let now = ctx.now();
    let window = ctx.settings.quarantine.retry_window_secs();
    match verdict {
        Verdict::Valid(artist) => {
            let mut refreshed = group.clone();
            let mut profile = artist.to_profile();
            // stored spelling wins
            profile.name = group.profile.name.clone();
            refreshed.profile = profile;
            record_event(
                ctx.store.as_ref(),
                &refreshed,
                QuarantineEvent::Revalidated,
                now,
                window,
            )?;
            Ok(true)
        }
        Verdict::Invalid(reason) => {
            record_event(
                ctx.store.as_ref(),
                group,
                QuarantineEvent::Failed(reason.to_string()),
                now,
                window,
            )?;
            Ok(false)
        }
    }
}

pub fn run_revalidation(ctx: &PipelineContext) -> Result<PhaseReport> {
    let groups = ctx.store.find_groups(&GroupFilter::eligible(ctx.now()))?;
    let mut report = PhaseReport::default();

    info!("Revalidation: {} eligible groups", groups.len());

    for (i, group) in groups.iter().enumerate() {
        if ctx.is_cancelled() {
            report.stopped = Some(StopReason::Cancelled);
            break;
        }
        if i > 0 {
            ctx.pace(ctx.settings.pacing.revalidation_delay);
        }
        report.stats.processed += 1;

        let verdict = match revalidate_group(ctx, group) {
            Ok(verdict) => verdict,
            Err(HarvestError::RateLimitExceeded { wait_secs }) => {
                warn!(
                    "Rate limit of {}s while revalidating {}; aborting run",
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
                warn!("Failed to revalidate {}: {}", group.name(), e);
                report.stats.failed += 1;
                continue;
            }
        };

        match apply_verdict(ctx, group, verdict) {
            Ok(true) => report.stats.updated += 1,
            Ok(false) => report.stats.deactivated += 1,
            Err(e) => {
                warn!("Failed to record revalidation of {}: {:#}", group.name(), e);
                report.stats.failed += 1;
            }
        }
    }

    info!(
        "Revalidation done: {} checked, {} valid, {} deactivated, {} quarantined, {} failed",
        report.stats.processed,
        report.stats.updated,
        report.stats.deactivated,
        report.stats.quarantined,
        report.stats.failed
    );
    Ok(report)
}
