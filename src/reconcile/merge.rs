//! Merging the authoritative release listing with search results.

use crate::provider::AlbumObject;
use crate::store::DiscoveryMethod;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ReconciledRelease {
    pub album: AlbumObject,
    pub discovery_method: DiscoveryMethod,
}

/// A provider release date at whatever precision it was reported.
/// Missing month or day compare lower than any present value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReleaseDate {
    year: i32,
    month: u32,
    day: u32,
}

impl ReleaseDate {
    /// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('-');
        let year = parts.next()?.parse::<i32>().ok()?;
        let month = match parts.next() {
            Some(m) => m.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?,
            None => 0,
        };
        let day = match parts.next() {
            Some(d) if month > 0 => d.parse::<u32>().ok().filter(|d| (1..=31).contains(d))?,
            Some(_) => return None,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { year, month, day })
    }
}

fn release_date(album: &AlbumObject) -> Option<ReleaseDate> {
    album.release_date.as_deref().and_then(ReleaseDate::parse)
}

/// Newest first; undated releases last.
fn newest_first(a: &ReconciledRelease, b: &ReconciledRelease) -> Ordering {
    release_date(&b.album).cmp(&release_date(&a.album))
}

/// Merges both listings for the group whose provider id is `owner_external_id`.
///
/// Every authoritative release is kept (first occurrence per id). A search
/// result is added only if its id is new and its first credited artist is the
/// owner. The result is sorted by release date, newest first, with ties kept
/// in insertion order (authoritative before search).
pub fn reconcile_releases(
    authoritative: Vec<AlbumObject>,
    search: Vec<AlbumObject>,
    owner_external_id: &str,
) -> Vec<ReconciledRelease> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(authoritative.len() + search.len());

    for album in authoritative {
        if seen.insert(album.id.clone()) {
            merged.push(ReconciledRelease {
                album,
                discovery_method: DiscoveryMethod::Authoritative,
            });
        }
    }

    for album in search {
        if album.primary_artist_id() != Some(owner_external_id) {
            continue;
        }
        if seen.insert(album.id.clone()) {
            merged.push(ReconciledRelease {
                album,
                discovery_method: DiscoveryMethod::Search,
            });
        }
    }

    merged.sort_by(newest_first);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimpleArtist;

    fn album(id: &str, artist_id: &str, date: Option<&str>) -> AlbumObject {
        AlbumObject {
            id: id.to_string(),
            name: format!("Release {}", id),
            album_type: Some("album".to_string()),
            album_group: None,
            total_tracks: 8,
            release_date: date.map(String::from),
            artists: vec![SimpleArtist {
                id: Some(artist_id.to_string()),
                name: "Artist".to_string(),
            }],
            external_urls: None,
            images: Vec::new(),
        }
    }

    fn ids(merged: &[ReconciledRelease]) -> Vec<&str> {
        merged.iter().map(|r| r.album.id.as_str()).collect()
    }

    #[test]
    fn test_parse_release_date_precisions() {
        assert!(ReleaseDate::parse("2020").is_some());
        assert!(ReleaseDate::parse("2020-07").is_some());
        assert!(ReleaseDate::parse("2020-07-15").is_some());
        assert!(ReleaseDate::parse("").is_none());
        assert!(ReleaseDate::parse("2020-13").is_none());
        assert!(ReleaseDate::parse("2020-07-15-01").is_none());
        assert!(ReleaseDate::parse("0000-00-00").is_none());
    }

    #[test]
    fn test_lower_precision_sorts_before_same_period_dates() {
        let year = ReleaseDate::parse("2020").unwrap();
        let month = ReleaseDate::parse("2020-01").unwrap();
        let day = ReleaseDate::parse("2020-01-01").unwrap();
        assert!(year < month);
        assert!(month < day);
        assert!(ReleaseDate::parse("2019-12-31").unwrap() < year);
    }

    #[test]
    fn test_shared_id_kept_once_as_authoritative() {
        let merged = reconcile_releases(
            vec![album("X", "owner", Some("2021-01-01"))],
            vec![album("X", "owner", Some("2021-01-01"))],
            "owner",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].discovery_method, DiscoveryMethod::Authoritative);
    }

    #[test]
    fn test_foreign_search_results_are_dropped() {
        let merged = reconcile_releases(
            vec![],
            vec![
                album("mine", "owner", Some("2021")),
                album("theirs", "someone-else", Some("2022")),
            ],
            "owner",
        );
        assert_eq!(ids(&merged), vec!["mine"]);
        assert_eq!(merged[0].discovery_method, DiscoveryMethod::Search);
    }

    #[test]
    fn test_search_result_without_artists_is_dropped() {
        let mut orphan = album("orphan", "owner", None);
        orphan.artists.clear();
        assert!(reconcile_releases(vec![], vec![orphan], "owner").is_empty());
    }

    #[test]
    fn test_authoritative_duplicates_collapse_to_first() {
        let mut second = album("A", "owner", Some("2010"));
        second.name = "Duplicate".to_string();
        let merged = reconcile_releases(
            vec![album("A", "owner", Some("2010")), second],
            vec![],
            "owner",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].album.name, "Release A");
    }

    #[test]
    fn test_sorted_newest_first_with_undated_last() {
        let merged = reconcile_releases(
            vec![
                album("old", "owner", Some("2015-03-01")),
                album("undated", "owner", None),
                album("new", "owner", Some("2023")),
            ],
            vec![album("mid", "owner", Some("2019-06"))],
            "owner",
        );
        assert_eq!(ids(&merged), vec!["new", "mid", "old", "undated"]);
    }

    #[test]
    fn test_ties_keep_authoritative_first() {
        let merged = reconcile_releases(
            vec![album("auth", "owner", Some("2020-05-05"))],
            vec![album("found", "owner", Some("2020-05-05"))],
            "owner",
        );
        assert_eq!(ids(&merged), vec!["auth", "found"]);
    }
}
