//! Paginated fetching with rate-limit handling and transient-error backoff.

use super::models::Paging;
use super::retry_policy::{RetryPolicy, Sleeper};
use super::token::TokenManager;
use super::transport::{HttpResponse, ProviderTransport};
use crate::error::{HarvestError, HarvestResult};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The provider refuses offsets at or past this value.
pub const MAX_SEARCH_WINDOW: u32 = 1000;

const ERROR_BODY_PREVIEW: usize = 200;

/// Items from a single listing request.
#[derive(Debug)]
pub struct ResultPage<T> {
    pub offset: u32,
    pub items: Vec<T>,
    pub total: Option<u64>,
}

pub struct Harvester {
    transport: Arc<dyn ProviderTransport>,
    tokens: Arc<TokenManager>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    page_size: u32,
    page_delay: Duration,
}

impl Harvester {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        tokens: Arc<TokenManager>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        page_size: u32,
        page_delay: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            policy,
            sleeper,
            page_size: page_size.max(1),
            page_delay,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetches and decodes a single resource.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> HarvestResult<T> {
        let body = self.execute(url, query)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lazily walks a listing. `container` names the object holding the
    /// paging envelope (`"artists"` for an artist search); `None` means the
    /// envelope is the response root.
    ///
    /// The sequence ends after a short page, at the provider's search window,
    /// once `total` is reached, or right after yielding an error.
    pub fn fetch_pages<T: DeserializeOwned>(
        &self,
        url: String,
        query: Vec<(String, String)>,
        container: Option<&'static str>,
    ) -> PageIter<'_, T> {
        PageIter {
            harvester: self,
            url,
            query,
            container,
            offset: 0,
            pages_fetched: 0,
            done: false,
            _item: PhantomData,
        }
    }

    /// One logical request: retries transient failures with backoff and
    /// sleeps through acceptable rate-limit waits.
    fn execute(&self, url: &str, query: &[(String, String)]) -> HarvestResult<String> {
        let mut attempt: u32 = 0;
        loop {
            let credential = self.tokens.get_valid_credential()?;

            let failure = match self.transport.get(url, query, &credential.access_token) {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) if response.status == 404 => return Err(HarvestError::NotFound),
                Ok(response) if response.status == 429 => {
                    match self.policy.rate_limit_wait(response.retry_after) {
                        Ok(wait) => {
                            warn!("Rate limited on {}, waiting {}s", url, wait);
                            self.sleeper.sleep(Duration::from_secs(wait));
                            continue;
                        }
                        Err(wait) => {
                            warn!(
                                "Rate limited on {} for {}s, above the {}s ceiling",
                                url, wait, self.policy.rate_limit_ceiling_secs
                            );
                            return Err(HarvestError::RateLimitExceeded { wait_secs: wait });
                        }
                    }
                }
                Ok(response) => {
                    if response.status == 401 {
                        self.tokens.invalidate();
                    }
                    upstream_error(&response)
                }
                Err(e) => HarvestError::Upstream {
                    status: None,
                    message: e.to_string(),
                },
            };

            attempt += 1;
            if !self.policy.should_retry(attempt) {
                warn!("Giving up on {} after {} attempts: {}", url, attempt, failure);
                return Err(failure);
            }
            let backoff = self.policy.backoff_secs(attempt - 1);
            warn!(
                "Request to {} failed (attempt {}/{}): {}. Retrying in {}s",
                url, attempt, self.policy.max_attempts, failure, backoff
            );
            self.sleeper.sleep(Duration::from_secs(backoff));
        }
    }
}

fn upstream_error(response: &HttpResponse) -> HarvestError {
    let message: String = response.body.chars().take(ERROR_BODY_PREVIEW).collect();
    HarvestError::Upstream {
        status: Some(response.status),
        message,
    }
}

pub struct PageIter<'a, T> {
    harvester: &'a Harvester,
    url: String,
    query: Vec<(String, String)>,
    container: Option<&'static str>,
    offset: u32,
    pages_fetched: u32,
    done: bool,
    _item: PhantomData<T>,
}

impl<T: DeserializeOwned> PageIter<'_, T> {
    fn decode(&self, body: &str) -> HarvestResult<Paging<T>> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;
        if let Some(key) = self.container {
            value = value
                .get_mut(key)
                .map(serde_json::Value::take)
                .unwrap_or(serde_json::Value::Null);
            if value.is_null() {
                return Ok(Paging {
                    items: Vec::new(),
                    total: Some(0),
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl<T: DeserializeOwned> Iterator for PageIter<'_, T> {
    type Item = HarvestResult<ResultPage<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= MAX_SEARCH_WINDOW {
            self.done = true;
            return None;
        }

        let harvester = self.harvester;
        if self.pages_fetched > 0 && !harvester.page_delay.is_zero() {
            harvester.sleeper.sleep(harvester.page_delay);
        }

        let mut query = self.query.clone();
        query.push(("limit".to_string(), harvester.page_size.to_string()));
        query.push(("offset".to_string(), self.offset.to_string()));

        let paging = match harvester
            .execute(&self.url, &query)
            .and_then(|body| self.decode(&body))
        {
            Ok(paging) => paging,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        self.pages_fetched += 1;

        let offset = self.offset;
        let raw_len = paging.items.len() as u32;
        self.offset += harvester.page_size;
        if raw_len < harvester.page_size
            || self.offset >= MAX_SEARCH_WINDOW
            || paging.total.is_some_and(|total| self.offset as u64 >= total)
        {
            self.done = true;
        }
        debug!(
            "Fetched page at offset {} of {} ({} items)",
            offset, self.url, raw_len
        );

        Some(Ok(ResultPage {
            offset,
            items: paging.items.into_iter().flatten().collect(),
            total: paging.total,
        }))
    }
}
