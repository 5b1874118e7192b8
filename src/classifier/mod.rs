//! Accept/reject decisions for harvested candidates.
//!
//! Classification is pure: a candidate and a [`RuleSet`] in, a
//! [`Classification`] out.

mod rules;
mod similarity;

pub use rules::{
    Matcher, Rule, RuleEffect, RuleField, RuleSet, Thresholds, DEFAULT_DOMAIN_GENRES,
    DEFAULT_DOMAIN_NAME_KEYWORDS, DEFAULT_DOMAIN_NAME_PATTERNS, DEFAULT_EXCLUDED_GROUPINGS,
    DEFAULT_LABEL_KEYWORDS, DEFAULT_RELEASE_PLACEHOLDER_PATTERNS,
    DEFAULT_SUSPICIOUS_NAME_PATTERNS, PLACEHOLDER_RELEASE_NAMES,
};
pub use similarity::name_similarity;

use crate::provider::{AlbumObject, ArtistObject};
use crate::store::GroupProfile;

#[derive(Debug, Clone, Copy)]
pub struct GroupCandidate<'a> {
    pub name: &'a str,
    pub genres: &'a [String],
    pub popularity: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ReleaseCandidate<'a> {
    pub name: &'a str,
    pub track_count: u32,
    /// The provider's grouping labels (`album_group`, `album_type`).
    pub groupings: [Option<&'a str>; 2],
}

#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Group(GroupCandidate<'a>),
    Release(ReleaseCandidate<'a>),
}

impl<'a> From<&'a ArtistObject> for Candidate<'a> {
    fn from(artist: &'a ArtistObject) -> Self {
        Candidate::Group(GroupCandidate {
            name: &artist.name,
            genres: &artist.genres,
            popularity: artist.popularity,
        })
    }
}

impl<'a> From<&'a GroupProfile> for Candidate<'a> {
    fn from(profile: &'a GroupProfile) -> Self {
        Candidate::Group(GroupCandidate {
            name: &profile.name,
            genres: &profile.genres,
            popularity: profile.popularity,
        })
    }
}

impl<'a> From<&'a AlbumObject> for Candidate<'a> {
    fn from(album: &'a AlbumObject) -> Self {
        Candidate::Release(ReleaseCandidate {
            name: &album.name,
            track_count: album.total_tracks,
            groupings: [album.album_group.as_deref(), album.album_type.as_deref()],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub accept: bool,
    pub reason: Option<String>,
}

impl Classification {
    fn accepted() -> Self {
        Self {
            accept: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accept: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn classify<'a>(candidate: impl Into<Candidate<'a>>, rules: &RuleSet) -> Classification {
    match candidate.into() {
        Candidate::Group(group) => classify_group(&group, rules),
        Candidate::Release(release) => classify_release(&release, rules),
    }
}

fn classify_group(group: &GroupCandidate<'_>, rules: &RuleSet) -> Classification {
    let thresholds = &rules.thresholds;
    let name = group.name.trim();
    if name.chars().count() < thresholds.min_name_length.max(1) {
        return Classification::rejected("name too short");
    }

    let in_domain = rules.has_domain_genre(group.genres)
        || (group.popularity > thresholds.domain_name_popularity
            && rules.has_domain_signal(RuleField::GroupName, name));
    if !in_domain {
        return Classification::rejected("not in domain");
    }

    if group.popularity < thresholds.min_popularity {
        return Classification::rejected("popularity below minimum");
    }

    if let Some(rule) = rules.rejection(RuleField::GroupName, name) {
        if let RuleEffect::Reject(reason) = &rule.effect {
            return Classification::rejected(reason.clone());
        }
    }

    Classification::accepted()
}

fn classify_release(release: &ReleaseCandidate<'_>, rules: &RuleSet) -> Classification {
    if release.track_count < rules.thresholds.min_track_count {
        return Classification::rejected("too few tracks");
    }

    let name = release.name.trim();
    if name.is_empty() {
        return Classification::rejected("empty name");
    }

    if let Some(grouping) = release
        .groupings
        .iter()
        .flatten()
        .find(|g| rules.is_excluded_grouping(g))
    {
        return Classification::rejected(format!("excluded grouping: {}", grouping));
    }

    if let Some(rule) = rules.rejection(RuleField::ReleaseName, name) {
        if let RuleEffect::Reject(reason) = &rule.effect {
            return Classification::rejected(reason.clone());
        }
    }

    Classification::accepted()
}
