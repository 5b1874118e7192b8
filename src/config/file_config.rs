use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,

    // Feature configs
    pub provider: Option<ProviderConfig>,
    pub retry: Option<RetryConfig>,
    pub pacing: Option<PacingConfig>,
    pub quarantine: Option<QuarantineConfig>,
    pub discovery: Option<DiscoveryConfig>,
    pub classifier: Option<ClassifierConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub token_url: Option<String>,
    pub api_base: Option<String>,
    pub market: Option<String>,
    pub page_size: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub max_backoff_secs: Option<u64>,
    pub rate_limit_ceiling_secs: Option<u64>,
    pub default_retry_after_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PacingConfig {
    pub discovery_delay_ms: Option<u64>,
    pub completion_delay_ms: Option<u64>,
    pub revalidation_delay_ms: Option<u64>,
    pub page_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QuarantineConfig {
    pub retry_window_hours: Option<u64>,
    pub similarity_threshold: Option<f64>,
    /// 0 keeps inactive groups forever.
    pub inactive_retention_days: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub queries: Option<Vec<String>>,
    pub search_release_limit: Option<usize>,
    pub max_barren_pages: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub domain_genres: Option<Vec<String>>,
    pub domain_name_keywords: Option<Vec<String>>,
    pub domain_name_patterns: Option<Vec<String>>,
    pub label_keywords: Option<Vec<String>>,
    pub suspicious_name_patterns: Option<Vec<String>>,
    pub release_placeholder_patterns: Option<Vec<String>>,
    pub excluded_groupings: Option<Vec<String>>,
    pub min_popularity: Option<u32>,
    pub domain_name_popularity: Option<u32>,
    pub min_name_length: Option<usize>,
    pub min_track_count: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
