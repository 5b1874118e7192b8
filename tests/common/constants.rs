//! Shared identifiers and timestamps.

#![allow(dead_code)]

/// Fixed "now" of every harness clock (2023-11-14T22:13:20Z).
pub const NOW: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;

pub const API_BASE: &str = "https://provider.test/v1";
pub const TOKEN_URL: &str = "https://provider.test/api/token";

/// The single discovery query the harness config runs.
pub const DISCOVERY_QUERY: &str = "genre:\"k-pop\"";

pub const GROUP_1_ID: &str = "3Nrfpe0tUJi4K4DXYWgMUX";
pub const GROUP_2_ID: &str = "2dIgFjalVxs4ThymZ67YCE";
pub const GROUP_3_ID: &str = "6HvZYsbFfjnjFrWF950C9d";
pub const OTHER_ARTIST_ID: &str = "0C8ZW7ezQVs4URX5aX7Kqx";
