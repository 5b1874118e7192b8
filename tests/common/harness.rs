//! A pipeline wired to the mock provider and a throwaway SQLite file.

#![allow(dead_code)]

use super::constants::{API_BASE, NOW, TOKEN_URL};
use super::mock_provider::MockProvider;
use catalog_harvester::config::{AppConfig, CliConfig, FileConfig};
use catalog_harvester::pipeline::{run_pipeline, FixedClock, PipelineContext, RunMode, RunStats};
use catalog_harvester::provider::RecordingSleeper;
use catalog_harvester::store::{Group, GroupFilter, HarvestStore, Release, ReleaseFilter, SqliteHarvestStore};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct TestHarness {
    pub ctx: PipelineContext,
    pub provider: Arc<MockProvider>,
    pub store: Arc<SqliteHarvestStore>,
    pub sleeper: Arc<RecordingSleeper>,
    pub clock: Arc<FixedClock>,
    pub config: AppConfig,
    // Keep temp dir alive for the harness lifetime
    _temp_dir: TempDir,
}

fn config_toml() -> String {
    format!(
        r#"
[provider]
api_base = "{API_BASE}"
token_url = "{TOKEN_URL}"
client_id = "test-client"
client_secret = "test-secret"
market = "KR"

[pacing]
discovery_delay_ms = 0
completion_delay_ms = 0
revalidation_delay_ms = 0
page_delay_ms = 0

[discovery]
queries = ['genre:"k-pop"']
"#
    )
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Builds the harness from a config file, letting `adjust` tweak the
    /// resolved config before the pipeline is wired.
    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("harvester.toml");
        std::fs::write(&config_path, config_toml()).expect("Failed to write config");

        let cli = CliConfig {
            db_path: Some(temp_dir.path().join("catalog.db")),
            ..Default::default()
        };
        let file_config = FileConfig::load(&config_path).expect("Failed to load config");
        let mut config =
            AppConfig::resolve(&cli, Some(file_config)).expect("Failed to resolve config");
        adjust(&mut config);

        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(
            SqliteHarvestStore::new(&config.db_path).expect("Failed to open catalog store"),
        );
        let sleeper = Arc::new(RecordingSleeper::new());
        let clock = Arc::new(FixedClock::new(NOW));
        let ctx = PipelineContext::from_config(
            &config,
            store.clone(),
            provider.clone(),
            sleeper.clone(),
            clock.clone(),
            CancellationToken::new(),
        )
        .expect("Failed to build pipeline context");

        TestHarness {
            ctx,
            provider,
            store,
            sleeper,
            clock,
            config,
            _temp_dir: temp_dir,
        }
    }

    pub fn run(&self, mode: RunMode) -> RunStats {
        run_pipeline(&self.ctx, mode).expect("Pipeline run failed")
    }

    pub fn group_by_external_id(&self, external_id: &str) -> Option<Group> {
        self.store
            .find_group(&GroupFilter::by_external_id(external_id))
            .unwrap()
    }

    pub fn releases_of(&self, group_id: i64) -> Vec<Release> {
        self.store
            .find_releases(&ReleaseFilter::by_group(group_id))
            .unwrap()
    }

    /// Releases of `group_id` by provider id, sorted.
    pub fn release_ids_of(&self, group_id: i64) -> Vec<String> {
        let mut ids: Vec<String> = self
            .releases_of(group_id)
            .into_iter()
            .filter_map(|r| r.external_id)
            .collect();
        ids.sort();
        ids
    }

    /// The longest single sleep, if any sleep happened.
    pub fn longest_sleep_secs(&self) -> Option<u64> {
        self.sleeper.sleeps().iter().map(|d| d.as_secs()).max()
    }
}
