//! Endpoint wrappers over the [`Harvester`].

use super::harvester::{Harvester, PageIter};
use super::models::{AlbumObject, ArtistObject};
use crate::error::HarvestResult;

/// Release groupings requested from the artist listing.
const ARTIST_RELEASE_GROUPS: &str = "album,single";

pub struct ProviderClient {
    harvester: Harvester,
    api_base: String,
    market: String,
}

impl ProviderClient {
    pub fn new(harvester: Harvester, api_base: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            harvester,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            market: market.into(),
        }
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    fn search_query(&self, q: String, kind: &str) -> Vec<(String, String)> {
        vec![
            ("q".to_string(), q),
            ("type".to_string(), kind.to_string()),
            ("market".to_string(), self.market.clone()),
        ]
    }

    /// Free-text artist search (`genre:"k-pop"`, `kpop`, ...).
    pub fn search_artists(&self, query: &str) -> PageIter<'_, ArtistObject> {
        self.harvester.fetch_pages(
            format!("{}/search", self.api_base),
            self.search_query(query.to_string(), "artist"),
            Some("artists"),
        )
    }

    /// Release search scoped to an artist name. Results may credit other
    /// artists and must be ownership-checked by the caller.
    pub fn search_releases_by_artist(&self, artist_name: &str) -> PageIter<'_, AlbumObject> {
        self.harvester.fetch_pages(
            format!("{}/search", self.api_base),
            self.search_query(format!("artist:\"{}\"", artist_name), "album"),
            Some("albums"),
        )
    }

    /// The provider's own release listing for an artist.
    pub fn artist_releases(&self, artist_id: &str) -> PageIter<'_, AlbumObject> {
        self.harvester.fetch_pages(
            format!(
                "{}/artists/{}/albums",
                self.api_base,
                urlencoding::encode(artist_id)
            ),
            vec![
                (
                    "include_groups".to_string(),
                    ARTIST_RELEASE_GROUPS.to_string(),
                ),
                ("market".to_string(), self.market.clone()),
            ],
            None,
        )
    }

    pub fn get_artist(&self, artist_id: &str) -> HarvestResult<ArtistObject> {
        self.harvester.get_json(
            &format!(
                "{}/artists/{}",
                self.api_base,
                urlencoding::encode(artist_id)
            ),
            &[],
        )
    }
}
