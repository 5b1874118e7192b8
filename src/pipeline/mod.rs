//! The harvesting pipeline: discovery, completion, revalidation and cleanup,
//! run in that order by the orchestrator.

mod cleanup;
mod completion;
mod context;
mod discovery;
mod orchestrator;
mod report;
mod revalidation;
mod stats;

pub use cleanup::run_cleanup;
pub use completion::{harvest_group, run_completion, GroupHarvest};
pub use context::{Clock, FixedClock, PipelineContext, PipelineSettings, SystemClock};
pub use discovery::{find_candidates, run_discovery, CandidateSearch, DiscoveryCandidate};
pub use orchestrator::{run_pipeline, RunMode};
pub use report::{print_run_summary, StoreReport};
pub use revalidation::{revalidate_group, run_revalidation, Verdict};
pub use stats::{CleanupStats, PhaseReport, PhaseStats, ReleaseCounts, RunStats, StopReason};
