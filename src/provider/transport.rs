//! HTTP seam between the provider client and the network.

use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use thiserror::Error;

/// The parts of a provider response the client cares about.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (connect, timeout, body read).
#[derive(Debug, Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

pub trait ProviderTransport: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        bearer_token: &str,
    ) -> Result<HttpResponse, TransportError>;

    fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("catalog-harvester/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn into_response(
        response: reqwest::blocking::Response,
    ) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

impl ProviderTransport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        bearer_token: &str,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(bearer_token)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        Self::into_response(response)
    }

    fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .basic_auth(basic_auth.0, Some(basic_auth.1))
            .form(form)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        Self::into_response(response)
    }
}
