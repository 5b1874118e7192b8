//! Client-credentials token cache.

use super::transport::ProviderTransport;
use crate::error::{HarvestError, HarvestResult};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A cached credential is refreshed once less than this much lifetime remains.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Credential {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at
            .checked_duration_since(now)
            .map(|remaining| remaining > TOKEN_REFRESH_MARGIN)
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub struct TokenManager {
    transport: Arc<dyn ProviderTransport>,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached credential, exchanging for a new one when it is
    /// missing or about to expire. The lock is held across the exchange, so
    /// callers racing on an expired credential trigger a single refresh.
    pub fn get_valid_credential(&self) -> HarvestResult<Credential> {
        let mut cached = self.cached.lock().unwrap();
        if let Some(credential) = cached.as_ref() {
            if credential.is_fresh(Instant::now()) {
                return Ok(credential.clone());
            }
            debug!("Access token expires soon, refreshing");
        }

        let credential = self.exchange()?;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    /// Drops the cached credential, e.g. after the provider rejected it.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap() = None;
    }

    fn exchange(&self) -> HarvestResult<Credential> {
        let requested_at = Instant::now();
        let response = self
            .transport
            .post_form(
                &self.token_url,
                (&self.client_id, &self.client_secret),
                &[("grant_type", "client_credentials")],
            )
            .map_err(|e| HarvestError::Auth(e.to_string()))?;

        if response.status != 200 {
            return Err(HarvestError::Auth(format!(
                "token endpoint returned status {}",
                response.status
            )));
        }

        let body: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| HarvestError::Auth(format!("malformed token response: {}", e)))?;

        info!("Obtained access token valid for {}s", body.expires_in);
        Ok(Credential {
            access_token: body.access_token,
            expires_at: requested_at + Duration::from_secs(body.expires_in),
        })
    }
}
