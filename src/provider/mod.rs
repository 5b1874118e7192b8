//! Provider access: credentials, paginated harvesting, endpoint wrappers.

mod client;
mod harvester;
mod models;
mod retry_policy;
mod token;
mod transport;

pub use client::ProviderClient;
pub use harvester::{Harvester, PageIter, ResultPage, MAX_SEARCH_WINDOW};
pub use models::{AlbumObject, ArtistObject, ExternalUrls, Followers, Image, SimpleArtist};
pub use retry_policy::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use token::{Credential, TokenManager, TOKEN_REFRESH_MARGIN};
pub use transport::{HttpResponse, ProviderTransport, ReqwestTransport, TransportError};

#[cfg(test)]
pub(crate) mod test_support {
    use super::transport::{HttpResponse, ProviderTransport, TransportError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Scripted = Result<HttpResponse, TransportError>;

    /// Replays queued responses in order; records every GET it receives.
    #[derive(Default)]
    pub struct ScriptedTransport {
        token_responses: Mutex<VecDeque<Scripted>>,
        get_responses: Mutex<VecDeque<Scripted>>,
        token_requests: Mutex<usize>,
        gets: Mutex<Vec<(String, Vec<(String, String)>)>>,
        always_issue_token: bool,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Token exchanges always succeed with a long-lived token.
        pub fn with_token() -> Self {
            Self {
                always_issue_token: true,
                ..Self::default()
            }
        }

        pub fn push_token(&self, token: &str, expires_in: u64) {
            self.push_token_status(
                200,
                &format!(
                    r#"{{"access_token": "{}", "token_type": "Bearer", "expires_in": {}}}"#,
                    token, expires_in
                ),
            );
        }

        pub fn push_token_status(&self, status: u16, body: &str) {
            self.token_responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                retry_after: None,
                body: body.to_string(),
            }));
        }

        pub fn push_ok(&self, body: &str) {
            self.push_status(200, None, body);
        }

        pub fn push_status(&self, status: u16, retry_after: Option<u64>, body: &str) {
            self.get_responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                retry_after,
                body: body.to_string(),
            }));
        }

        pub fn push_network_error(&self, message: &str) {
            self.get_responses
                .lock()
                .unwrap()
                .push_back(Err(TransportError(message.to_string())));
        }

        pub fn token_requests(&self) -> usize {
            *self.token_requests.lock().unwrap()
        }

        /// Query parameters of every GET, in order.
        pub fn get_requests(&self) -> Vec<Vec<(String, String)>> {
            self.gets
                .lock()
                .unwrap()
                .iter()
                .map(|(_, q)| q.clone())
                .collect()
        }

        pub fn get_urls(&self) -> Vec<String> {
            self.gets
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| u.clone())
                .collect()
        }
    }

    impl ProviderTransport for ScriptedTransport {
        fn get(
            &self,
            url: &str,
            query: &[(String, String)],
            _bearer_token: &str,
        ) -> Result<HttpResponse, TransportError> {
            self.gets
                .lock()
                .unwrap()
                .push((url.to_string(), query.to_vec()));
            self.get_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(HttpResponse {
                        status: 500,
                        retry_after: None,
                        body: "unscripted request".to_string(),
                    })
                })
        }

        fn post_form(
            &self,
            _url: &str,
            _basic_auth: (&str, &str),
            _form: &[(&str, &str)],
        ) -> Result<HttpResponse, TransportError> {
            *self.token_requests.lock().unwrap() += 1;
            if let Some(scripted) = self.token_responses.lock().unwrap().pop_front() {
                return scripted;
            }
            let status = if self.always_issue_token { 200 } else { 500 };
            Ok(HttpResponse {
                status,
                retry_after: None,
                body: r#"{"access_token": "test-token", "expires_in": 3600}"#.to_string(),
            })
        }
    }

    pub fn album_json(id: &str, artist_id: &str, total_tracks: u32) -> String {
        format!(
            r#"{{"id": "{id}", "name": "Release {id}", "album_type": "album",
                "total_tracks": {total_tracks}, "release_date": "2023-05-01",
                "artists": [{{"id": "{artist_id}", "name": "Artist"}}]}}"#
        )
    }

    pub fn artist_json(id: &str, name: &str, genres: &[&str], popularity: u32) -> String {
        let genres: Vec<String> = genres.iter().map(|g| format!("\"{}\"", g)).collect();
        format!(
            r#"{{"id": "{id}", "name": "{name}", "genres": [{}], "popularity": {popularity},
                "followers": {{"total": 1000}}}}"#,
            genres.join(", ")
        )
    }
}
