mod file_config;

pub use file_config::{
    ClassifierConfig, DiscoveryConfig, FileConfig, PacingConfig, ProviderConfig,
    QuarantineConfig, RetryConfig,
};

use crate::classifier::{
    DEFAULT_DOMAIN_GENRES, DEFAULT_DOMAIN_NAME_KEYWORDS, DEFAULT_DOMAIN_NAME_PATTERNS,
    DEFAULT_EXCLUDED_GROUPINGS, DEFAULT_LABEL_KEYWORDS, DEFAULT_RELEASE_PLACEHOLDER_PATTERNS,
    DEFAULT_SUSPICIOUS_NAME_PATTERNS,
};
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DISCOVERY_QUERIES: &[&str] =
    &["genre:\"k-pop\"", "genre:\"korean pop\"", "kpop", "k-pop"];

/// Largest page the provider serves for search and listing endpoints.
pub const MAX_PAGE_SIZE: u32 = 50;

/// CLI arguments that can be used for config resolution.
/// TOML values override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub market: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub provider: ProviderSettings,
    pub retry: RetrySettings,
    pub pacing: PacingSettings,
    pub quarantine: QuarantineSettings,
    pub discovery: DiscoverySettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub token_url: String,
    pub api_base: String,
    pub market: String,
    pub page_size: u32,
    pub timeout: Duration,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_base: "https://api.spotify.com/v1".to_string(),
            market: "FR".to_string(),
            page_size: MAX_PAGE_SIZE,
            timeout: Duration::from_secs(10),
            client_id: None,
            client_secret: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_secs: u64,
    pub rate_limit_ceiling_secs: u64,
    pub default_retry_after_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_secs: 1,
            backoff_multiplier: 2.0,
            max_backoff_secs: 60,
            rate_limit_ceiling_secs: 600,
            default_retry_after_secs: 60,
        }
    }
}

/// Static delays between units of work.
#[derive(Debug, Clone)]
pub struct PacingSettings {
    pub discovery_delay: Duration,
    pub completion_delay: Duration,
    pub revalidation_delay: Duration,
    pub page_delay: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            discovery_delay: Duration::from_millis(500),
            completion_delay: Duration::from_millis(800),
            revalidation_delay: Duration::from_millis(1000),
            page_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuarantineSettings {
    pub retry_window_hours: u64,
    pub similarity_threshold: f64,
    pub inactive_retention_days: u64,
}

impl QuarantineSettings {
    pub fn retry_window_secs(&self) -> i64 {
        self.retry_window_hours as i64 * 3600
    }
}

impl Default for QuarantineSettings {
    fn default() -> Self {
        Self {
            retry_window_hours: 24,
            similarity_threshold: 0.6,
            inactive_retention_days: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub queries: Vec<String>,
    /// Valid search results kept per group during completion.
    pub search_release_limit: usize,
    /// Consecutive search pages without a valid item before giving up.
    pub max_barren_pages: u32,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            queries: to_strings(DEFAULT_DISCOVERY_QUERIES),
            search_release_limit: 200,
            max_barren_pages: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub domain_genres: Vec<String>,
    pub domain_name_keywords: Vec<String>,
    pub domain_name_patterns: Vec<String>,
    pub label_keywords: Vec<String>,
    pub suspicious_name_patterns: Vec<String>,
    pub release_placeholder_patterns: Vec<String>,
    pub min_popularity: u32,
    pub domain_name_popularity: u32,
    pub min_name_length: usize,
    pub min_track_count: u32,
    pub excluded_groupings: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            domain_genres: to_strings(DEFAULT_DOMAIN_GENRES),
            domain_name_keywords: to_strings(DEFAULT_DOMAIN_NAME_KEYWORDS),
            domain_name_patterns: to_strings(DEFAULT_DOMAIN_NAME_PATTERNS),
            label_keywords: to_strings(DEFAULT_LABEL_KEYWORDS),
            suspicious_name_patterns: to_strings(DEFAULT_SUSPICIOUS_NAME_PATTERNS),
            release_placeholder_patterns: to_strings(DEFAULT_RELEASE_PLACEHOLDER_PATTERNS),
            min_popularity: 5,
            domain_name_popularity: 30,
            min_name_length: 2,
            min_track_count: 4,
            excluded_groupings: to_strings(DEFAULT_EXCLUDED_GROUPINGS),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be specified via --db-path or in config file"))?;
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let provider_file = file.provider.unwrap_or_default();
        let provider_defaults = ProviderSettings::default();
        let provider = ProviderSettings {
            token_url: provider_file
                .token_url
                .unwrap_or(provider_defaults.token_url),
            api_base: provider_file.api_base.unwrap_or(provider_defaults.api_base),
            market: provider_file
                .market
                .or_else(|| cli.market.clone())
                .unwrap_or(provider_defaults.market),
            page_size: provider_file
                .page_size
                .unwrap_or(provider_defaults.page_size),
            timeout: provider_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(provider_defaults.timeout),
            client_id: provider_file.client_id.or_else(|| cli.client_id.clone()),
            client_secret: provider_file
                .client_secret
                .or_else(|| cli.client_secret.clone()),
        };
        if provider.page_size == 0 || provider.page_size > MAX_PAGE_SIZE {
            bail!(
                "provider.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                provider.page_size
            );
        }

        let retry_file = file.retry.unwrap_or_default();
        let retry_defaults = RetrySettings::default();
        let retry = RetrySettings {
            max_attempts: retry_file
                .max_attempts
                .unwrap_or(retry_defaults.max_attempts),
            initial_backoff_secs: retry_file
                .initial_backoff_secs
                .unwrap_or(retry_defaults.initial_backoff_secs),
            backoff_multiplier: retry_file
                .backoff_multiplier
                .unwrap_or(retry_defaults.backoff_multiplier),
            max_backoff_secs: retry_file
                .max_backoff_secs
                .unwrap_or(retry_defaults.max_backoff_secs),
            rate_limit_ceiling_secs: retry_file
                .rate_limit_ceiling_secs
                .unwrap_or(retry_defaults.rate_limit_ceiling_secs),
            default_retry_after_secs: retry_file
                .default_retry_after_secs
                .unwrap_or(retry_defaults.default_retry_after_secs),
        };
        if retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if retry.backoff_multiplier < 1.0 {
            bail!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                retry.backoff_multiplier
            );
        }

        let pacing_file = file.pacing.unwrap_or_default();
        let pacing_defaults = PacingSettings::default();
        let pacing = PacingSettings {
            discovery_delay: pacing_file
                .discovery_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(pacing_defaults.discovery_delay),
            completion_delay: pacing_file
                .completion_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(pacing_defaults.completion_delay),
            revalidation_delay: pacing_file
                .revalidation_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(pacing_defaults.revalidation_delay),
            page_delay: pacing_file
                .page_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(pacing_defaults.page_delay),
        };

        let quarantine_file = file.quarantine.unwrap_or_default();
        let quarantine_defaults = QuarantineSettings::default();
        let quarantine = QuarantineSettings {
            retry_window_hours: quarantine_file
                .retry_window_hours
                .unwrap_or(quarantine_defaults.retry_window_hours),
            similarity_threshold: quarantine_file
                .similarity_threshold
                .unwrap_or(quarantine_defaults.similarity_threshold),
            inactive_retention_days: quarantine_file
                .inactive_retention_days
                .unwrap_or(quarantine_defaults.inactive_retention_days),
        };
        if !(0.0..=1.0).contains(&quarantine.similarity_threshold) {
            bail!(
                "quarantine.similarity_threshold must be between 0 and 1, got {}",
                quarantine.similarity_threshold
            );
        }

        let discovery_file = file.discovery.unwrap_or_default();
        let discovery_defaults = DiscoverySettings::default();
        let discovery = DiscoverySettings {
            queries: discovery_file
                .queries
                .unwrap_or(discovery_defaults.queries),
            search_release_limit: discovery_file
                .search_release_limit
                .unwrap_or(discovery_defaults.search_release_limit),
            max_barren_pages: discovery_file
                .max_barren_pages
                .unwrap_or(discovery_defaults.max_barren_pages),
        };

        let classifier_file = file.classifier.unwrap_or_default();
        let classifier_defaults = ClassifierSettings::default();
        let classifier = ClassifierSettings {
            domain_genres: classifier_file
                .domain_genres
                .unwrap_or(classifier_defaults.domain_genres),
            domain_name_keywords: classifier_file
                .domain_name_keywords
                .unwrap_or(classifier_defaults.domain_name_keywords),
            domain_name_patterns: classifier_file
                .domain_name_patterns
                .unwrap_or(classifier_defaults.domain_name_patterns),
            label_keywords: classifier_file
                .label_keywords
                .unwrap_or(classifier_defaults.label_keywords),
            suspicious_name_patterns: classifier_file
                .suspicious_name_patterns
                .unwrap_or(classifier_defaults.suspicious_name_patterns),
            release_placeholder_patterns: classifier_file
                .release_placeholder_patterns
                .unwrap_or(classifier_defaults.release_placeholder_patterns),
            min_popularity: classifier_file
                .min_popularity
                .unwrap_or(classifier_defaults.min_popularity),
            domain_name_popularity: classifier_file
                .domain_name_popularity
                .unwrap_or(classifier_defaults.domain_name_popularity),
            min_name_length: classifier_file
                .min_name_length
                .unwrap_or(classifier_defaults.min_name_length),
            min_track_count: classifier_file
                .min_track_count
                .unwrap_or(classifier_defaults.min_track_count),
            excluded_groupings: classifier_file
                .excluded_groupings
                .unwrap_or(classifier_defaults.excluded_groupings),
        };

        Ok(Self {
            db_path,
            provider,
            retry,
            pacing,
            quarantine,
            discovery,
            classifier,
        })
    }

    /// Client id and secret, required by every command that talks to the provider.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.provider.client_id, &self.provider.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok((id.as_str(), secret.as_str()))
            }
            _ => bail!(
                "Provider credentials missing: set HARVESTER_CLIENT_ID and HARVESTER_CLIENT_SECRET or [provider] client_id/client_secret"
            ),
        }
    }
}
