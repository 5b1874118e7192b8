//! Provider response shapes. Only the fields the pipeline reads are modelled.

use crate::store::GroupProfile;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub followers: Option<Followers>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl ArtistObject {
    pub fn follower_count(&self) -> u64 {
        self.followers
            .as_ref()
            .and_then(|f| f.total)
            .unwrap_or(0)
    }

    pub fn to_profile(&self) -> GroupProfile {
        GroupProfile {
            external_id: Some(self.id.clone()),
            name: self.name.trim().to_string(),
            genres: self.genres.clone(),
            popularity: self.popularity.min(100),
            followers: self.follower_count(),
            provider_url: self.external_urls.as_ref().and_then(|u| u.spotify.clone()),
            image_url: self.images.first().map(|i| i.url.clone()),
        }
    }
}

/// Artist reference embedded in a release.
#[derive(Debug, Clone, Deserialize)]
pub struct SimpleArtist {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub album_type: Option<String>,
    /// Relationship to the queried artist; only present on artist listings.
    #[serde(default)]
    pub album_group: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl AlbumObject {
    pub fn primary_artist_id(&self) -> Option<&str> {
        self.artists.first().and_then(|a| a.id.as_deref())
    }

    pub fn provider_url(&self) -> Option<String> {
        self.external_urls.as_ref().and_then(|u| u.spotify.clone())
    }

    pub fn image_url(&self) -> Option<String> {
        self.images.first().map(|i| i.url.clone())
    }
}

/// One page of a listing. Search responses occasionally contain `null`
/// entries, which are kept here so the page length stays truthful.
#[derive(Debug, Deserialize)]
pub(crate) struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub total: Option<u64>,
}
