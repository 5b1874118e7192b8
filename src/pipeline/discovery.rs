//! Discovery of groups not yet in the store.

use super::completion::{harvest_group, quarantine_rate_limited};
use super::context::PipelineContext;
use super::stats::{PhaseReport, StopReason};
use crate::classifier::classify;
use crate::error::HarvestError;
use crate::provider::ArtistObject;
use crate::reconcile::{find_existing_group, upsert_group};
use crate::store::GroupFilter;
use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct DiscoveryCandidate {
    pub artist: ArtistObject,
    pub query: String,
}

/// Outcome of the search half of discovery.
#[derive(Default)]
pub struct CandidateSearch {
    pub candidates: Vec<DiscoveryCandidate>,
    pub rejected: u64,
    pub known: u64,
    /// Failed queries plus candidates whose store lookup failed.
    pub failed: u64,
    pub stopped: Option<StopReason>,
}

/// Runs every configured query and keeps accepted artists that are not stored
/// yet, first query wins on duplicates. Sorted by popularity, highest first.
/// A failing query or store lookup only loses that query or candidate.
pub fn find_candidates(ctx: &PipelineContext) -> CandidateSearch {
    let mut search = CandidateSearch::default();
    let mut seen: HashSet<String> = HashSet::new();

    'queries: for (i, query) in ctx.settings.discovery.queries.iter().enumerate() {
        if ctx.is_cancelled() {
            search.stopped = Some(StopReason::Cancelled);
            break;
        }
        if i > 0 {
            ctx.pace(ctx.settings.pacing.discovery_delay);
        }

        debug!("Discovery query {}", query);
        for page in ctx.provider.search_artists(query) {
            let page = match page {
                Ok(page) => page,
                Err(HarvestError::RateLimitExceeded { wait_secs }) => {
                    warn!("Rate limit of {}s during discovery search", wait_secs);
                    search.stopped = Some(StopReason::RateLimited { wait_secs });
                    break 'queries;
                }
                Err(e) => {
                    warn!("Discovery query {} failed: {}", query, e);
                    search.failed += 1;
                    break;
                }
            };

            for artist in page.items {
                if !seen.insert(artist.id.clone()) {
                    continue;
                }
                let verdict = classify(&artist, &ctx.rules);
                if !verdict.accept {
                    debug!(
                        "Rejected {}: {}",
                        artist.name,
                        verdict.reason.unwrap_or_default()
                    );
                    search.rejected += 1;
                    continue;
                }
                match find_existing_group(ctx.store.as_ref(), &artist.to_profile()) {
                    Ok(Some(_)) => {
                        search.known += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to look up {} in the store: {:#}", artist.name, e);
                        search.failed += 1;
                        continue;
                    }
                }
                search.candidates.push(DiscoveryCandidate {
                    artist,
                    query: query.clone(),
                });
            }
        }
    }

    search
        .candidates
        .sort_by(|a, b| b.artist.popularity.cmp(&a.artist.popularity));
    search
}

/// Searches for new groups, stores them and harvests their releases.
/// Returns the report and the ids of groups whose releases were harvested.
pub fn run_discovery(ctx: &PipelineContext) -> Result<(PhaseReport, HashSet<i64>)> {
    let search = find_candidates(ctx);
    let mut report = PhaseReport {
        stopped: search.stopped,
        ..Default::default()
    };
    report.stats.discovered = search.candidates.len() as u64;
    report.stats.rejected = search.rejected;
    report.stats.skipped = search.known;
    report.stats.failed = search.failed;
    let mut harvested = HashSet::new();

    info!(
        "Discovery: {} new candidates, {} rejected, {} already known",
        search.candidates.len(),
        search.rejected,
        search.known
    );
    if report.stopped.is_some() {
        return Ok((report, harvested));
    }

    for (i, candidate) in search.candidates.iter().enumerate() {
        if ctx.is_cancelled() {
            report.stopped = Some(StopReason::Cancelled);
            break;
        }
        if i > 0 {
            ctx.pace(ctx.settings.pacing.discovery_delay);
        }
        report.stats.processed += 1;

        let profile = candidate.artist.to_profile();
        let source = format!("search:{}", candidate.query);
        let outcome = match upsert_group(ctx.store.as_ref(), &profile, Some(&source), ctx.now()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to store {}: {:#}", profile.name, e);
                report.stats.failed += 1;
                continue;
            }
        };
        if outcome.is_created() {
            report.stats.created += 1;
        } else {
            report.stats.updated += 1;
        }

        let group = match ctx.store.find_group(&GroupFilter::by_id(outcome.id())) {
            Ok(Some(group)) => group,
            Ok(None) => {
                warn!("Group {} vanished after upsert", outcome.id());
                report.stats.failed += 1;
                continue;
            }
            Err(e) => {
                warn!("Failed to reload {}: {:#}", profile.name, e);
                report.stats.failed += 1;
                continue;
            }
        };

        match harvest_group(ctx, &group) {
            Ok(harvest) => {
                harvested.insert(group.id);
                report.stats.harvested += 1;
                report.stats.releases.absorb(harvest.changes);
                report.stats.releases.rejected += harvest.rejected;
                info!(
                    "Discovered {} ({} releases)",
                    group.name(),
                    harvest.changes.created + harvest.changes.updated
                );
            }
            Err(HarvestError::RateLimitExceeded { wait_secs }) => {
                warn!(
                    "Rate limit of {}s while harvesting {}; aborting run",
                    wait_secs,
                    group.name()
                );
                if quarantine_rate_limited(ctx, &group) {
                    report.stats.quarantined += 1;
                }
                report.stopped = Some(StopReason::RateLimited { wait_secs });
                break;
            }
            Err(e) => {
                warn!("Failed to harvest releases of {}: {}", group.name(), e);
                report.stats.failed += 1;
            }
        }
    }

    Ok((report, harvested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{page, pipeline, FlakyStore};
    use crate::provider::test_support::{album_json, artist_json};
    use crate::store::{HarvestStore, ReleaseFilter};
    use std::sync::Arc;

    #[test]
    fn test_failed_lookup_loses_only_that_candidate() {
        let mut t = pipeline();
        let store = Arc::new(FlakyStore {
            failing_name: Some("ITZY".to_string()),
            ..FlakyStore::new(t.store.clone())
        });
        t.ctx.store = store.clone();
        t.ctx.settings.discovery.queries = vec!["kpop".to_string()];

        t.transport.push_ok(&format!(
            r#"{{"artists": {}}}"#,
            page(
                &[
                    artist_json("aespa-id", "aespa", &["k-pop"], 75),
                    artist_json("itzy-id", "ITZY", &["k-pop"], 80),
                ],
                2,
            )
        ));
        t.transport
            .push_ok(&page(&[album_json("r1", "aespa-id", 10)], 1));
        t.transport
            .push_ok(&format!(r#"{{"albums": {}}}"#, page(&[], 0)));

        let (report, harvested) = run_discovery(&t.ctx).unwrap();
        assert_eq!(report.stopped, None);
        assert_eq!(report.stats.discovered, 1);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.created, 1);
        assert_eq!(report.stats.harvested, 1);
        assert_eq!(harvested.len(), 1);

        let stored = t
            .store
            .find_group(&GroupFilter::by_external_id("aespa-id"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.discovery_source.as_deref(), Some("search:kpop"));
        assert_eq!(
            t.store
                .count_releases(&ReleaseFilter::by_group(stored.id))
                .unwrap(),
            1
        );
        assert!(t
            .store
            .find_group(&GroupFilter::by_external_id("itzy-id"))
            .unwrap()
            .is_none());
    }
}
