//! End-to-end tests for release harvesting of stored groups.

mod common;

use catalog_harvester::pipeline::{RunMode, StopReason};
use catalog_harvester::store::{
    DiscoveryMethod, Group, GroupFilter, GroupProfile, HarvestStore, ReleaseFilter, ReleaseKind,
    RunOutcome,
};
use common::{
    album, artist, listed_album, TestHarness, DAY, GROUP_1_ID, GROUP_2_ID, NOW, OTHER_ARTIST_ID,
};

fn store_group(harness: &TestHarness, external_id: &str, name: &str) -> i64 {
    harness
        .provider
        .add_artist(artist(external_id, name, &["k-pop"], 70));
    harness
        .store
        .insert_group(&Group::new(
            GroupProfile {
                external_id: Some(external_id.to_string()),
                name: name.to_string(),
                genres: vec!["k-pop".to_string()],
                popularity: 70,
                ..Default::default()
            },
            None,
            NOW - DAY,
        ))
        .unwrap()
}

fn completion_run(harness: &TestHarness) -> catalog_harvester::pipeline::RunStats {
    harness.run(RunMode::Full { revalidate: false })
}

#[test]
fn test_short_release_from_search_is_not_persisted() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "IVE");
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![
            listed_album("r8", GROUP_1_ID, "I've IVE", 8, "2023-04-10", "album"),
            listed_album("r5", GROUP_1_ID, "After Like", 5, "2022-08-22", "single"),
        ],
    );
    harness.provider.set_release_search(
        "IVE",
        vec![album("r3", GROUP_1_ID, "Baddie", 3, "2023-10-13")],
    );

    let stats = completion_run(&harness);
    let completion = stats.completion.unwrap();
    assert_eq!(completion.processed, 1);
    assert_eq!(completion.releases.created, 2);
    assert_eq!(completion.releases.rejected, 1);

    let mut kinds: Vec<(String, ReleaseKind)> = harness
        .releases_of(id)
        .into_iter()
        .map(|r| (r.external_id.unwrap(), r.release_kind))
        .collect();
    kinds.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        kinds,
        vec![
            ("r5".to_string(), ReleaseKind::Ep),
            ("r8".to_string(), ReleaseKind::Album),
        ]
    );
}

#[test]
fn test_search_results_are_merged_without_duplicates() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "IVE");
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![
            listed_album("a1", GROUP_1_ID, "I've IVE", 11, "2023-04-10", "album"),
            listed_album("a2", GROUP_1_ID, "Eleven", 4, "2021-12-01", "single"),
            listed_album("a3", GROUP_1_ID, "Hits Collection", 20, "2020-01-01", "compilation"),
        ],
    );
    harness.provider.set_release_search(
        "IVE",
        vec![
            album("a2", GROUP_1_ID, "Eleven", 4, "2021-12-01"),
            album("s1", GROUP_1_ID, "I've Mine", 6, "2023-10-13"),
            album("s2", OTHER_ARTIST_ID, "Ive Been Thinking", 12, "2019-05-01"),
        ],
    );

    completion_run(&harness);

    assert_eq!(
        harness.release_ids_of(id),
        vec!["a1".to_string(), "a2".to_string(), "s1".to_string()]
    );
    let a2 = harness
        .store
        .find_release(&ReleaseFilter::by_external_id("a2"))
        .unwrap()
        .unwrap();
    assert_eq!(a2.discovery_method, DiscoveryMethod::Authoritative);
    let s1 = harness
        .store
        .find_release(&ReleaseFilter::by_external_id("s1"))
        .unwrap()
        .unwrap();
    assert_eq!(s1.discovery_method, DiscoveryMethod::Search);
    assert_eq!(s1.release_kind, ReleaseKind::Ep);
    assert_eq!(s1.release_date.as_deref(), Some("2023-10-13"));
    assert_eq!(
        s1.provider_url.as_deref(),
        Some("https://open.spotify.com/album/s1")
    );
}

#[test]
fn test_listing_is_paginated() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "SEVENTEEN");
    let albums = (0..55)
        .map(|i| {
            listed_album(
                &format!("alb{:02}", i),
                GROUP_1_ID,
                &format!("Mini Album {}", i),
                9,
                "2020-01-01",
                "album",
            )
        })
        .collect();
    harness.provider.set_listing(GROUP_1_ID, albums);

    completion_run(&harness);

    assert_eq!(harness.releases_of(id).len(), 55);
    assert_eq!(
        harness
            .provider
            .count_requests(&format!("/artists/{}/albums", GROUP_1_ID)),
        2
    );
}

#[test]
fn test_releases_missing_from_a_new_harvest_are_pruned() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "NMIXX");
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![
            listed_album("n1", GROUP_1_ID, "Expergo", 6, "2023-03-20", "single"),
            listed_album("n2", GROUP_1_ID, "A Midsummer NMIXX's Dream", 6, "2023-07-11", "single"),
        ],
    );
    completion_run(&harness);
    assert_eq!(harness.releases_of(id).len(), 2);

    harness.provider.set_listing(
        GROUP_1_ID,
        vec![listed_album("n1", GROUP_1_ID, "Expergo", 6, "2023-03-20", "single")],
    );
    let stats = completion_run(&harness);

    let releases = stats.completion.unwrap().releases;
    assert_eq!(releases.updated, 1);
    assert_eq!(releases.pruned, 1);
    assert_eq!(harness.release_ids_of(id), vec!["n1".to_string()]);
}

#[test]
fn test_empty_harvest_leaves_stored_releases_alone() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "NMIXX");
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![listed_album("n1", GROUP_1_ID, "Expergo", 6, "2023-03-20", "single")],
    );
    completion_run(&harness);

    harness.provider.set_listing(GROUP_1_ID, Vec::new());
    let stats = completion_run(&harness);

    assert_eq!(stats.completion.unwrap().releases.pruned, 0);
    assert_eq!(harness.releases_of(id).len(), 1);
}

#[test]
fn test_rate_limit_above_ceiling_aborts_and_quarantines() {
    let harness = TestHarness::new();
    let first = store_group(&harness, GROUP_1_ID, "ENHYPEN");
    let second = store_group(&harness, GROUP_2_ID, "TREASURE");
    harness
        .provider
        .throttle(&format!("/artists/{}/albums", GROUP_1_ID), 700);

    let stats = completion_run(&harness);

    assert_eq!(stats.stopped, Some(StopReason::RateLimited { wait_secs: 700 }));
    assert_eq!(stats.completion.unwrap().quarantined, 1);
    assert!(harness.longest_sleep_secs().unwrap_or(0) < 700);
    // the run stops before reaching the next group
    assert_eq!(harness.provider.count_requests(GROUP_2_ID), 0);

    let group = harness.group_by_external_id(GROUP_1_ID).unwrap();
    assert_eq!(group.id, first);
    assert!(group.active);
    let quarantine = group.quarantine.unwrap();
    assert_eq!(quarantine.reason, "rate limited");
    assert_eq!(quarantine.retry_after, Some(NOW + DAY));

    let last_run = harness.store.last_run().unwrap().unwrap();
    assert_eq!(last_run.outcome, RunOutcome::Aborted);

    // still inside the window: the quarantined group is not retried
    harness.provider.clear_throttles();
    harness.clock.advance(DAY - 1);
    let stats = completion_run(&harness);
    assert_eq!(stats.completion.unwrap().processed, 1);
    assert_eq!(
        harness
            .provider
            .count_requests(&format!("/artists/{}/albums", GROUP_1_ID)),
        1
    );

    // once the window has passed it is eligible again
    harness.clock.advance(1);
    let eligible = harness
        .store
        .find_groups(&GroupFilter::eligible(NOW + DAY))
        .unwrap();
    assert_eq!(eligible.iter().map(|g| g.id).collect::<Vec<_>>(), vec![first, second]);
    let stats = completion_run(&harness);
    assert_eq!(stats.completion.unwrap().processed, 2);
}

#[test]
fn test_acceptable_rate_limit_waits_and_continues() {
    let harness = TestHarness::new();
    let id = store_group(&harness, GROUP_1_ID, "LE SSERAFIM");
    harness.provider.set_listing(
        GROUP_1_ID,
        vec![listed_album("l1", GROUP_1_ID, "Unforgiven", 13, "2023-05-01", "album")],
    );
    harness
        .provider
        .throttle_times(&format!("/artists/{}/albums", GROUP_1_ID), 30, 2);

    let stats = completion_run(&harness);

    assert_eq!(stats.stopped, None);
    let waits: Vec<u64> = harness
        .sleeper
        .sleeps()
        .iter()
        .map(|d| d.as_secs())
        .filter(|s| *s == 30)
        .collect();
    assert_eq!(waits, vec![30, 30]);
    assert_eq!(harness.releases_of(id).len(), 1);
    assert_eq!(harness.group_by_external_id(GROUP_1_ID).unwrap().quarantine, None);
}

#[test]
fn test_failing_group_does_not_stop_the_phase() {
    let harness = TestHarness::new();
    store_group(&harness, GROUP_1_ID, "KEP1ER");
    let healthy = store_group(&harness, GROUP_2_ID, "ITZY");
    harness.provider.remove_artist(GROUP_1_ID);
    harness.provider.set_listing(
        GROUP_2_ID,
        vec![listed_album("z1", GROUP_2_ID, "Born to Be", 10, "2024-01-08", "album")],
    );

    let stats = completion_run(&harness);

    assert_eq!(stats.stopped, None);
    let completion = stats.completion.unwrap();
    assert_eq!(completion.processed, 2);
    assert_eq!(completion.failed, 1);
    assert_eq!(completion.harvested, 1);
    assert_eq!(harness.releases_of(healthy).len(), 1);
    // a failed harvest is not a quarantine event
    assert_eq!(harness.group_by_external_id(GROUP_1_ID).unwrap().quarantine, None);
}
