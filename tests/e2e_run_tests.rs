//! End-to-end tests for run bookkeeping, cancellation and reporting.

mod common;

use catalog_harvester::config::{AppConfig, CliConfig};
use catalog_harvester::pipeline::{
    FixedClock, PipelineContext, RunMode, RunStats, StopReason, StoreReport,
};
use catalog_harvester::provider::RecordingSleeper;
use catalog_harvester::store::{HarvestStore, RunOutcome, SqliteHarvestStore};
use common::{
    artist, listed_album, MockProvider, TestHarness, DISCOVERY_QUERY, GROUP_1_ID, NOW,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn seed(harness: &TestHarness) {
    harness
        .provider
        .add_artist(artist(GROUP_1_ID, "BLACKPINK", &["k-pop"], 88));
    harness.provider.add_artist_search(DISCOVERY_QUERY, &[GROUP_1_ID]);
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![listed_album("b1", GROUP_1_ID, "BORN PINK", 8, "2022-09-16", "album")],
    );
}

#[test]
fn test_completed_run_is_recorded_with_stats() {
    let harness = TestHarness::new();
    seed(&harness);

    harness.run(RunMode::Full { revalidate: true });

    let run = harness.store.last_run().unwrap().unwrap();
    assert_eq!(run.mode, "full+revalidate");
    assert_eq!(run.outcome, RunOutcome::Completed);
    assert_eq!(run.started_at, NOW);
    assert_eq!(run.finished_at, Some(NOW));

    let stats: RunStats = serde_json::from_str(run.stats_json.as_deref().unwrap()).unwrap();
    assert_eq!(stats.discovery.unwrap().created, 1);
    assert_eq!(stats.revalidation.unwrap().updated, 1);
    assert!(stats.cleanup.is_some());
    assert_eq!(stats.totals().releases.created, 1);
}

#[test]
fn test_cancelled_run_stops_before_any_request() {
    let harness = TestHarness::new();
    seed(&harness);
    harness.ctx.cancellation_token.cancel();

    let stats = harness.run(RunMode::Full { revalidate: true });

    assert_eq!(stats.stopped, Some(StopReason::Cancelled));
    assert!(harness.provider.requests().is_empty());
    let run = harness.store.last_run().unwrap().unwrap();
    assert_eq!(run.outcome, RunOutcome::Cancelled);
}

#[test]
fn test_token_is_reused_across_requests() {
    let harness = TestHarness::new();
    seed(&harness);

    harness.run(RunMode::Full { revalidate: true });

    assert!(harness.provider.requests().len() > 1);
    assert_eq!(harness.provider.token_requests(), 1);
}

#[test]
fn test_store_report_after_a_run() {
    let harness = TestHarness::new();
    seed(&harness);
    harness.run(RunMode::Full { revalidate: false });

    let report = StoreReport::collect(harness.store.as_ref()).unwrap();
    assert_eq!(report.groups, 1);
    assert_eq!(report.active_groups, 1);
    assert_eq!(report.releases, 1);
    assert_eq!(report.releases_by_method[0].key, "authoritative");
    assert_eq!(report.top_groups[0].key, "BLACKPINK");
    assert_eq!(report.last_run.unwrap().mode, "full");
}

#[test]
fn test_catalog_survives_reopening() {
    let harness = TestHarness::new();
    seed(&harness);
    harness.run(RunMode::Full { revalidate: false });

    let reopened = SqliteHarvestStore::new(&harness.config.db_path).unwrap();
    let report = StoreReport::collect(&reopened).unwrap();
    assert_eq!(report.groups, 1);
    assert_eq!(report.releases, 1);
}

#[test]
fn test_missing_credentials_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    let cli = CliConfig {
        db_path: Some(temp_dir.path().join("catalog.db")),
        ..Default::default()
    };
    let config = AppConfig::resolve(&cli, None).unwrap();
    let store = Arc::new(SqliteHarvestStore::new(&config.db_path).unwrap());

    let result = PipelineContext::from_config(
        &config,
        store,
        Arc::new(MockProvider::new()),
        Arc::new(RecordingSleeper::new()),
        Arc::new(FixedClock::new(NOW)),
        CancellationToken::new(),
    );

    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("HARVESTER_CLIENT_ID"), "{}", message);
}
