//! In-process provider API.

#![allow(dead_code)]

use super::constants::API_BASE;
use catalog_harvester::provider::{HttpResponse, ProviderTransport, TransportError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

struct Throttle {
    path_fragment: String,
    retry_after_secs: u64,
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockState {
    artists: HashMap<String, Value>,
    /// Artist search query -> artist ids, in result order.
    artist_searches: HashMap<String, Vec<String>>,
    /// Artist id -> the artist's own release listing.
    listings: HashMap<String, Vec<Value>>,
    /// Artist name -> release search results.
    release_searches: HashMap<String, Vec<Value>>,
    /// Requests whose path contains the fragment get a 429 with this wait,
    /// for the remaining number of times (`None` is forever).
    throttled: Vec<Throttle>,
    requests: Vec<String>,
    token_requests: usize,
}

/// Serves artists, artist searches, listings and release searches from
/// in-memory tables. Unknown artists are 404s; everything else is paginated
/// with the caller's `offset` and `limit`.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artist(&self, artist: Value) {
        let id = artist["id"].as_str().unwrap_or_default().to_string();
        self.state.lock().unwrap().artists.insert(id, artist);
    }

    pub fn remove_artist(&self, id: &str) {
        self.state.lock().unwrap().artists.remove(id);
    }

    pub fn add_artist_search(&self, query: &str, artist_ids: &[&str]) {
        self.state.lock().unwrap().artist_searches.insert(
            query.to_string(),
            artist_ids.iter().map(|id| id.to_string()).collect(),
        );
    }

    pub fn set_listing(&self, artist_id: &str, albums: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(artist_id.to_string(), albums);
    }

    pub fn set_release_search(&self, artist_name: &str, albums: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .release_searches
            .insert(artist_name.to_string(), albums);
    }

    pub fn throttle(&self, path_fragment: &str, retry_after_secs: u64) {
        self.add_throttle(path_fragment, retry_after_secs, None);
    }

    pub fn throttle_times(&self, path_fragment: &str, retry_after_secs: u64, times: usize) {
        self.add_throttle(path_fragment, retry_after_secs, Some(times));
    }

    fn add_throttle(&self, path_fragment: &str, retry_after_secs: u64, remaining: Option<usize>) {
        self.state.lock().unwrap().throttled.push(Throttle {
            path_fragment: path_fragment.to_string(),
            retry_after_secs,
            remaining,
        });
    }

    pub fn clear_throttles(&self) {
        self.state.lock().unwrap().throttled.clear();
    }

    /// Paths (relative to the API base) of every GET, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count_requests(&self, path_fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|path| path.contains(path_fragment))
            .count()
    }

    pub fn token_requests(&self) -> usize {
        self.state.lock().unwrap().token_requests
    }
}

fn respond(status: u16, body: Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status,
        retry_after: None,
        body: body.to_string(),
    })
}

fn not_found() -> Result<HttpResponse, TransportError> {
    respond(
        404,
        json!({"error": {"status": 404, "message": "Resource not found"}}),
    )
}

fn paged(items: &[Value], offset: usize, limit: usize) -> Value {
    let start = offset.min(items.len());
    let end = (offset + limit).min(items.len());
    json!({
        "items": &items[start..end],
        "offset": offset,
        "limit": limit,
        "total": items.len(),
    })
}

impl ProviderTransport for MockProvider {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        _bearer_token: &str,
    ) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let path = url.strip_prefix(API_BASE).unwrap_or(url).to_string();
        state.requests.push(path.clone());

        if let Some(throttle) = state
            .throttled
            .iter_mut()
            .find(|t| t.remaining != Some(0) && path.contains(&t.path_fragment))
        {
            if let Some(remaining) = throttle.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(HttpResponse {
                status: 429,
                retry_after: Some(throttle.retry_after_secs),
                body: String::new(),
            });
        }

        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let offset = param("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit = param("limit").and_then(|v| v.parse().ok()).unwrap_or(20);

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["search"] => {
                let q = param("q").unwrap_or_default();
                match param("type") {
                    Some("artist") => {
                        let items: Vec<Value> = state
                            .artist_searches
                            .get(q)
                            .map(|ids| {
                                ids.iter()
                                    .filter_map(|id| state.artists.get(id).cloned())
                                    .collect()
                            })
                            .unwrap_or_default();
                        respond(200, json!({"artists": paged(&items, offset, limit)}))
                    }
                    Some("album") => {
                        let name = q
                            .strip_prefix("artist:\"")
                            .and_then(|rest| rest.strip_suffix('"'))
                            .unwrap_or(q);
                        let items = state
                            .release_searches
                            .get(name)
                            .cloned()
                            .unwrap_or_default();
                        respond(200, json!({"albums": paged(&items, offset, limit)}))
                    }
                    _ => respond(400, json!({"error": {"status": 400, "message": "bad type"}})),
                }
            }
            ["artists", id, "albums"] => {
                if !state.artists.contains_key(*id) {
                    return not_found();
                }
                let items = state.listings.get(*id).cloned().unwrap_or_default();
                respond(200, paged(&items, offset, limit))
            }
            ["artists", id] => match state.artists.get(*id) {
                Some(artist) => respond(200, artist.clone()),
                None => not_found(),
            },
            _ => not_found(),
        }
    }

    fn post_form(
        &self,
        _url: &str,
        _basic_auth: (&str, &str),
        _form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.state.lock().unwrap().token_requests += 1;
        respond(
            200,
            json!({"access_token": "mock-token", "token_type": "Bearer", "expires_in": 3600}),
        )
    }
}
