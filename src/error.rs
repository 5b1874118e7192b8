use thiserror::Error;

/// Failures surfaced by the provider client and the pipeline units built on it.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The client-credentials exchange failed; no credential is available.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider asked us to wait longer than we are willing to.
    #[error("Rate limited for {wait_secs}s, above the configured ceiling")]
    RateLimitExceeded { wait_secs: u64 },

    #[error("Upstream error (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Resource not found")]
    NotFound,

    #[error("Failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl HarvestError {
    pub fn persistence(err: anyhow::Error) -> Self {
        HarvestError::Persistence(format!("{:#}", err))
    }

    /// Errors that end the whole run rather than a single unit.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, HarvestError::RateLimitExceeded { .. })
    }
}

pub type HarvestResult<T> = std::result::Result<T, HarvestError>;
