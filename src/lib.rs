//! Catalog Harvester Library
//!
//! Discovers groups on the provider, harvests their releases, reconciles them
//! into a local SQLite catalog and keeps stored groups honest through
//! revalidation and quarantine.

pub mod classifier;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod quarantine;
pub mod reconcile;
pub mod sqlite_persistence;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use error::{HarvestError, HarvestResult};
pub use pipeline::{run_pipeline, PipelineContext, RunMode, RunStats, StopReason};
pub use store::{HarvestStore, SqliteHarvestStore};
