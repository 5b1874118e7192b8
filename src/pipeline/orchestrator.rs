//! Runs the phases in order and records the run.

use super::cleanup::run_cleanup;
use super::completion::run_completion;
use super::context::PipelineContext;
use super::discovery::run_discovery;
use super::revalidation::run_revalidation;
use super::stats::{PhaseReport, PhaseStats, RunStats, StopReason};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Discovery then completion, optionally followed by revalidation and cleanup.
    Full { revalidate: bool },
    /// Revalidation and cleanup only.
    RevalidateOnly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full { revalidate: false } => "full",
            RunMode::Full { revalidate: true } => "full+revalidate",
            RunMode::RevalidateOnly => "revalidate",
        }
    }

    fn revalidates(&self) -> bool {
        matches!(
            self,
            RunMode::Full { revalidate: true } | RunMode::RevalidateOnly
        )
    }
}

fn absorb(slot: &mut Option<PhaseStats>, report: &PhaseReport) -> Option<StopReason> {
    *slot = Some(report.stats);
    report.stopped
}

fn execute_phases(ctx: &PipelineContext, mode: RunMode, stats: &mut RunStats) -> Result<()> {
    if let RunMode::Full { .. } = mode {
        info!("Phase 1: discovery");
        let (report, harvested) = run_discovery(ctx).context("Discovery phase failed")?;
        if let Some(stop) = absorb(&mut stats.discovery, &report) {
            stats.stopped = Some(stop);
            return Ok(());
        }

        info!("Phase 2: completion");
        let report = run_completion(ctx, &harvested).context("Completion phase failed")?;
        if let Some(stop) = absorb(&mut stats.completion, &report) {
            stats.stopped = Some(stop);
            return Ok(());
        }
    }

    if mode.revalidates() {
        info!("Phase 3: revalidation");
        let report = run_revalidation(ctx).context("Revalidation phase failed")?;
        if let Some(stop) = absorb(&mut stats.revalidation, &report) {
            stats.stopped = Some(stop);
            return Ok(());
        }

        if ctx.is_cancelled() {
            stats.stopped = Some(StopReason::Cancelled);
            return Ok(());
        }
        stats.cleanup = Some(run_cleanup(ctx).context("Cleanup failed")?);
    }

    Ok(())
}

/// Runs the pipeline in `mode`. Rate-limit aborts and cancellation end the
/// run early and are reported in `RunStats::stopped`; a failed phase ends it
/// with `RunStats::error` set. Either way the partial statistics come back and
/// the run is recorded. Only the run bookkeeping itself returns `Err`.
pub fn run_pipeline(ctx: &PipelineContext, mode: RunMode) -> Result<RunStats> {
    let run_id = ctx
        .store
        .record_run_start(mode.as_str(), ctx.now())
        .context("Failed to record run start")?;
    info!("Starting {} run {}", mode.as_str(), run_id);

    let mut stats = RunStats::default();
    if let Err(e) = execute_phases(ctx, mode, &mut stats) {
        error!("Run {} failed: {:#}", run_id, e);
        stats.error = Some(format!("{:#}", e));
    }

    let outcome = stats.outcome();
    match stats.stopped {
        Some(StopReason::RateLimited { wait_secs }) => {
            warn!("Run {} aborted by a {}s rate limit", run_id, wait_secs)
        }
        Some(StopReason::Cancelled) => warn!("Run {} cancelled", run_id),
        None => {}
    }

    let stats_json = serde_json::to_string(&stats).context("Failed to serialize run stats")?;
    ctx.store
        .record_run_finish(run_id, outcome, ctx.now(), &stats_json)
        .context("Failed to record run finish")?;
    info!("Run {} finished: {}", run_id, outcome.as_str());

    Ok(stats)
}
