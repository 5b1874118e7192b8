//! Store statistics for the `stats` command and the end-of-run summary.

use super::stats::{RunStats, StopReason};
use crate::cli_style::{
    print_empty_list, print_error, print_key_value, print_key_value_highlight,
    print_section_footer, print_section_header, print_success, print_warning, TableBuilder,
};
use crate::store::{GroupFilter, GroupedCount, HarvestRun, HarvestStore, ReleaseFilter, ReleaseGrouping};
use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;

const TOP_GROUPS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub groups: u64,
    pub active_groups: u64,
    pub quarantined_groups: u64,
    pub inactive_groups: u64,
    pub releases: u64,
    pub releases_by_kind: Vec<GroupedCount>,
    pub releases_by_method: Vec<GroupedCount>,
    pub top_groups: Vec<GroupedCount>,
    pub last_run: Option<HarvestRun>,
}

impl StoreReport {
    pub fn collect(store: &dyn HarvestStore) -> Result<Self> {
        Ok(Self {
            groups: store.count_groups(&GroupFilter::default())?,
            active_groups: store.count_groups(&GroupFilter {
                active: Some(true),
                quarantined: Some(false),
                ..Default::default()
            })?,
            quarantined_groups: store.count_groups(&GroupFilter {
                quarantined: Some(true),
                ..Default::default()
            })?,
            inactive_groups: store.count_groups(&GroupFilter {
                active: Some(false),
                ..Default::default()
            })?,
            releases: store.count_releases(&ReleaseFilter::default())?,
            releases_by_kind: store.count_releases_grouped(ReleaseGrouping::ReleaseKind, None)?,
            releases_by_method: store
                .count_releases_grouped(ReleaseGrouping::DiscoveryMethod, None)?,
            top_groups: store.count_releases_grouped(ReleaseGrouping::Group, Some(TOP_GROUPS))?,
            last_run: store.last_run()?,
        })
    }

    pub fn print(&self) {
        print_section_header("Catalog");
        print_key_value_highlight("Groups", &self.groups.to_string());
        print_key_value("Active", &self.active_groups.to_string());
        print_key_value("Quarantined", &self.quarantined_groups.to_string());
        print_key_value("Inactive", &self.inactive_groups.to_string());
        print_key_value_highlight("Releases", &self.releases.to_string());
        print_section_footer();

        print_counts("Releases by kind", "Kind", &self.releases_by_kind);
        print_counts("Releases by discovery method", "Method", &self.releases_by_method);
        print_counts("Groups with most releases", "Group", &self.top_groups);

        print_section_header("Last run");
        match &self.last_run {
            Some(run) => {
                print_key_value("Run", &run.id.to_string());
                print_key_value("Mode", &run.mode);
                print_key_value("Started", &format_timestamp(run.started_at));
                print_key_value(
                    "Finished",
                    &run.finished_at
                        .map(format_timestamp)
                        .unwrap_or_else(|| "-".to_string()),
                );
                print_key_value("Outcome", run.outcome.as_str());
            }
            None => print_empty_list("No runs recorded"),
        }
        print_section_footer();
    }
}

fn print_counts(title: &str, key_header: &str, counts: &[GroupedCount]) {
    print_section_header(title);
    if counts.is_empty() {
        print_empty_list("Nothing stored yet");
    } else {
        let mut table = TableBuilder::new(vec![key_header, "Releases"]);
        for count in counts {
            table.add_row(vec![count.key.clone(), count.count.to_string()]);
        }
        table.print();
    }
    print_section_footer();
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Per-phase summary printed at the end of a run.
pub fn print_run_summary(stats: &RunStats) {
    let mut table = TableBuilder::new(vec![
        "Phase",
        "Found",
        "Processed",
        "Created",
        "Updated",
        "Harvested",
        "Quarantined",
        "Deactivated",
        "Failed",
        "Skipped",
        "Releases +/~/-",
    ]);
    for (name, phase) in stats.phases() {
        table.add_row(vec![
            name.to_string(),
            phase.discovered.to_string(),
            phase.processed.to_string(),
            phase.created.to_string(),
            phase.updated.to_string(),
            phase.harvested.to_string(),
            phase.quarantined.to_string(),
            phase.deactivated.to_string(),
            phase.failed.to_string(),
            phase.skipped.to_string(),
            format!(
                "{}/{}/{}",
                phase.releases.created, phase.releases.updated, phase.releases.pruned
            ),
        ]);
    }

    print_section_header("Run summary");
    if table.is_empty() {
        print_empty_list("No phase ran");
    } else {
        table.print();
    }
    if let Some(cleanup) = &stats.cleanup {
        print_key_value(
            "Placeholder releases deleted",
            &cleanup.placeholder_releases_deleted.to_string(),
        );
        print_key_value(
            "Inactive groups purged",
            &cleanup.inactive_groups_purged.to_string(),
        );
    }
    print_section_footer();

    if let Some(error) = &stats.error {
        print_error(&format!("Run failed: {}; statistics are partial", error));
        return;
    }
    match stats.stopped {
        None => print_success("Run completed"),
        Some(StopReason::Cancelled) => print_warning("Run cancelled; statistics are partial"),
        Some(StopReason::RateLimited { wait_secs }) => print_warning(&format!(
            "Run aborted: provider asked to wait {}s; statistics are partial",
            wait_secs
        )),
    }
}
