//! Run statistics, aggregated per phase and persisted with the run record.

use crate::reconcile::ReleaseSetChanges;
use crate::store::RunOutcome;
use serde::{Deserialize, Serialize};

/// Why a phase loop stopped before enumerating every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    RateLimited { wait_secs: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCounts {
    pub created: u64,
    pub updated: u64,
    pub pruned: u64,
    /// Provider items the classifier refused.
    pub rejected: u64,
}

impl ReleaseCounts {
    pub fn absorb(&mut self, changes: ReleaseSetChanges) {
        self.created += changes.created;
        self.updated += changes.updated;
        self.pruned += changes.pruned;
    }

    fn merge(&mut self, other: &ReleaseCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.pruned += other.pruned;
        self.rejected += other.rejected;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStats {
    /// New candidates found (discovery only).
    pub discovered: u64,
    /// Units actually worked on.
    pub processed: u64,
    pub created: u64,
    /// Existing group records overwritten with fresh provider data.
    pub updated: u64,
    /// Groups whose release set was harvested and written.
    pub harvested: u64,
    pub quarantined: u64,
    pub deactivated: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Candidates refused by the classifier.
    pub rejected: u64,
    pub releases: ReleaseCounts,
}

impl PhaseStats {
    pub fn merge(&mut self, other: &PhaseStats) {
        self.discovered += other.discovered;
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.harvested += other.harvested;
        self.quarantined += other.quarantined;
        self.deactivated += other.deactivated;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.releases.merge(&other.releases);
    }
}

/// Result of one phase loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub stats: PhaseStats,
    pub stopped: Option<StopReason>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub placeholder_releases_deleted: u64,
    pub inactive_groups_purged: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revalidation: Option<PhaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<StopReason>,
    /// Set when a phase failed as a whole; the phases before it still count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunStats {
    pub fn phases(&self) -> impl Iterator<Item = (&'static str, &PhaseStats)> {
        [
            ("discovery", self.discovery.as_ref()),
            ("completion", self.completion.as_ref()),
            ("revalidation", self.revalidation.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, stats)| stats.map(|s| (name, s)))
    }

    pub fn totals(&self) -> PhaseStats {
        let mut totals = PhaseStats::default();
        for (_, stats) in self.phases() {
            totals.merge(stats);
        }
        totals
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.error.is_some() {
            return RunOutcome::Failed;
        }
        match self.stopped {
            None => RunOutcome::Completed,
            Some(StopReason::Cancelled) => RunOutcome::Cancelled,
            Some(StopReason::RateLimited { .. }) => RunOutcome::Aborted,
        }
    }
}
