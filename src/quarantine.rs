//! Quarantine and retry lifecycle of groups.
//!
//! ```text
//!   Active ──rate limited──▶ QuarantinedRetryable ──retry window ends──▶ eligible again
//!     │  ▲                        │        │
//!     │  └──revalidated or harvested──┘    │
//!     └──failed check──▶ Inactive ◀──failed check
//! ```
//!
//! `Inactive` is terminal; only the inactive-retention purge removes it.

use crate::store::{Group, GroupFilter, HarvestStore, Quarantine, ReleaseFilter};
use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

pub const REASON_RATE_LIMITED: &str = "rate limited";
pub const REASON_NAME_MISMATCH: &str = "name mismatch";
pub const REASON_NOT_IN_DOMAIN: &str = "not in domain";
pub const REASON_NOT_FOUND: &str = "not found on provider";
pub const REASON_MISSING_EXTERNAL_ID: &str = "missing external id";

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarantineState {
    Active,
    QuarantinedRetryable { retry_after: i64 },
    Inactive,
}

impl QuarantineState {
    pub fn of(group: &Group) -> Self {
        if !group.active {
            return QuarantineState::Inactive;
        }
        match group.quarantine.as_ref().and_then(|q| q.retry_after) {
            Some(retry_after) => QuarantineState::QuarantinedRetryable { retry_after },
            None => QuarantineState::Active,
        }
    }

    /// Whether a group in this state takes part in a pass run at `now`.
    pub fn is_eligible(&self, now: i64) -> bool {
        match self {
            QuarantineState::Active => true,
            QuarantineState::QuarantinedRetryable { retry_after } => *retry_after <= now,
            QuarantineState::Inactive => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineEvent {
    /// The provider throttled us beyond the acceptable wait.
    RateLimited,
    /// A revalidation check failed for the given reason.
    Failed(String),
    Revalidated,
    /// A pass after the retry window succeeded without a revalidation check.
    Recovered,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Group {0} is inactive and cannot change state")]
    Terminal(i64),
}

/// Pure transition: returns the group as it should be stored after `event`.
pub fn transition(
    group: &Group,
    event: &QuarantineEvent,
    now: i64,
    retry_window_secs: i64,
) -> Result<Group, TransitionError> {
    if QuarantineState::of(group) == QuarantineState::Inactive {
        return Err(TransitionError::Terminal(group.id));
    }

    let mut next = group.clone();
    next.updated_at = now;
    match event {
        QuarantineEvent::RateLimited => {
            next.quarantine = Some(Quarantine {
                reason: REASON_RATE_LIMITED.to_string(),
                since: group.quarantine.as_ref().map(|q| q.since).unwrap_or(now),
                retry_after: Some(now + retry_window_secs),
            });
        }
        QuarantineEvent::Failed(reason) => {
            next.active = false;
            next.quarantine = Some(Quarantine {
                reason: reason.clone(),
                since: now,
                retry_after: None,
            });
        }
        QuarantineEvent::Revalidated => {
            next.quarantine = None;
            next.last_validated_at = Some(now);
        }
        QuarantineEvent::Recovered => {
            next.quarantine = None;
        }
    }
    Ok(next)
}

/// Applies `event` to the stored group and persists the result.
pub fn record_event(
    store: &dyn HarvestStore,
    group: &Group,
    event: QuarantineEvent,
    now: i64,
    retry_window_secs: i64,
) -> Result<QuarantineState> {
    let next = transition(group, &event, now, retry_window_secs)?;
    store.replace_group(&next)?;

    let state = QuarantineState::of(&next);
    match (&event, state) {
        (QuarantineEvent::RateLimited, QuarantineState::QuarantinedRetryable { retry_after }) => {
            warn!(
                "Quarantined group {} ({}) until {}",
                next.name(),
                next.id,
                retry_after
            );
        }
        (QuarantineEvent::Recovered, _) => {
            info!("Group {} ({}) left quarantine", next.name(), next.id);
        }
        (QuarantineEvent::Failed(reason), _) => {
            info!("Deactivated group {} ({}): {}", next.name(), next.id, reason);
        }
        _ => {}
    }
    Ok(state)
}

/// Hard-deletes groups that have been inactive for longer than
/// `retention_days`, releases first. `0` disables the purge.
pub fn purge_inactive(store: &dyn HarvestStore, retention_days: u64, now: i64) -> Result<u64> {
    if retention_days == 0 {
        return Ok(0);
    }
    let cutoff = now - retention_days as i64 * SECS_PER_DAY;
    let expired = store.find_groups(&GroupFilter {
        inactive_before: Some(cutoff),
        ..Default::default()
    })?;

    let mut purged = 0;
    for group in expired {
        let releases = store.delete_releases(&ReleaseFilter::by_group(group.id))?;
        purged += store.delete_groups(&GroupFilter::by_id(group.id))? as u64;
        info!(
            "Purged inactive group {} ({}) and {} releases",
            group.name(),
            group.id,
            releases
        );
    }
    Ok(purged)
}
