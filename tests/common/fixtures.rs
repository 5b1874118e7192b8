//! Provider payload builders.

#![allow(dead_code)]

use serde_json::{json, Value};

pub fn artist(id: &str, name: &str, genres: &[&str], popularity: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "genres": genres,
        "popularity": popularity,
        "followers": {"href": null, "total": popularity as u64 * 10_000},
        "external_urls": {"spotify": format!("https://open.spotify.com/artist/{}", id)},
        "images": [{"url": format!("https://i.scdn.co/image/{}", id), "height": 640, "width": 640}],
    })
}

/// A release as the provider returns it from search: no `album_group`.
pub fn album(id: &str, artist_id: &str, name: &str, tracks: u32, release_date: &str) -> Value {
    let album_type = if tracks >= 8 { "album" } else { "single" };
    json!({
        "id": id,
        "name": name,
        "album_type": album_type,
        "total_tracks": tracks,
        "release_date": release_date,
        "release_date_precision": "day",
        "artists": [{"id": artist_id, "name": "Artist"}],
        "external_urls": {"spotify": format!("https://open.spotify.com/album/{}", id)},
        "images": [],
    })
}

/// A release as it appears in an artist's own listing, with `album_group`.
pub fn listed_album(
    id: &str,
    artist_id: &str,
    name: &str,
    tracks: u32,
    release_date: &str,
    album_group: &str,
) -> Value {
    let mut value = album(id, artist_id, name, tracks, release_date);
    value["album_group"] = json!(album_group);
    value
}
