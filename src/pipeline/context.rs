use crate::classifier::RuleSet;
use crate::config::{AppConfig, DiscoverySettings, PacingSettings, QuarantineSettings};
use crate::provider::{
    Harvester, ProviderClient, ProviderTransport, RetryPolicy, Sleeper, TokenManager,
};
use crate::store::HarvestStore;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of "now" as unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub pacing: PacingSettings,
    pub quarantine: QuarantineSettings,
    pub discovery: DiscoverySettings,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pacing: config.pacing.clone(),
            quarantine: config.quarantine.clone(),
            discovery: config.discovery.clone(),
        }
    }
}

/// Shared resources handed to every phase of a run.
pub struct PipelineContext {
    /// Checked between units; the in-flight unit always completes.
    pub cancellation_token: CancellationToken,
    pub store: Arc<dyn HarvestStore>,
    pub provider: ProviderClient,
    pub rules: RuleSet,
    pub settings: PipelineSettings,
    pub sleeper: Arc<dyn Sleeper>,
    pub clock: Arc<dyn Clock>,
}

impl PipelineContext {
    /// Wires the provider stack (token manager, harvester, endpoints) and the
    /// rule set from resolved configuration.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn HarvestStore>,
        transport: Arc<dyn ProviderTransport>,
        sleeper: Arc<dyn Sleeper>,
        clock: Arc<dyn Clock>,
        cancellation_token: CancellationToken,
    ) -> Result<Self> {
        let (client_id, client_secret) = config.credentials()?;
        let tokens = Arc::new(TokenManager::new(
            transport.clone(),
            config.provider.token_url.clone(),
            client_id,
            client_secret,
        ));
        let harvester = Harvester::new(
            transport,
            tokens,
            RetryPolicy::new(&config.retry),
            sleeper.clone(),
            config.provider.page_size,
            config.pacing.page_delay,
        );
        let provider = ProviderClient::new(
            harvester,
            config.provider.api_base.clone(),
            config.provider.market.clone(),
        );
        let rules =
            RuleSet::new(&config.classifier).context("Failed to build classifier rule set")?;

        Ok(Self {
            cancellation_token,
            store,
            provider,
            rules,
            settings: PipelineSettings::from_config(config),
            sleeper,
            clock,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn pace(&self, delay: Duration) {
        if !delay.is_zero() {
            self.sleeper.sleep(delay);
        }
    }
}
