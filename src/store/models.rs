use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowercased, trimmed form of a name, used for case-insensitive identity.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quarantine {
    pub reason: String,
    pub since: i64,
    /// Set while the group may be retried; `None` once it is inactive.
    pub retry_after: Option<i64>,
}

/// Provider-sourced description of a group. Everything here is overwritten on
/// each successful harvest or revalidation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupProfile {
    pub external_id: Option<String>,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: u32,
    pub followers: u64,
    pub provider_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub profile: GroupProfile,
    pub active: bool,
    pub quarantine: Option<Quarantine>,
    pub discovery_source: Option<String>,
    pub last_validated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Group {
    /// A not-yet-persisted active group. `id` is assigned on insert.
    pub fn new(profile: GroupProfile, discovery_source: Option<String>, now: i64) -> Self {
        Self {
            id: 0,
            profile,
            active: true,
            quarantine: None,
            discovery_source,
            last_validated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn external_id(&self) -> Option<&str> {
        self.profile.external_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Single,
    Ep,
    Album,
}

impl ReleaseKind {
    pub fn from_track_count(track_count: u32) -> Self {
        match track_count {
            8.. => ReleaseKind::Album,
            4..=7 => ReleaseKind::Ep,
            _ => ReleaseKind::Single,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Single => "single",
            ReleaseKind::Ep => "ep",
            ReleaseKind::Album => "album",
        }
    }
}

impl FromStr for ReleaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ReleaseKind::Single),
            "ep" => Ok(ReleaseKind::Ep),
            "album" => Ok(ReleaseKind::Album),
            other => Err(format!("Unknown release kind: {}", other)),
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which listing a release was found through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    Authoritative,
    Search,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Authoritative => "authoritative",
            DiscoveryMethod::Search => "search",
        }
    }
}

impl FromStr for DiscoveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authoritative" => Ok(DiscoveryMethod::Authoritative),
            "search" => Ok(DiscoveryMethod::Search),
            other => Err(format!("Unknown discovery method: {}", other)),
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub external_id: Option<String>,
    pub group_id: i64,
    pub name: String,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, as reported by the provider.
    pub release_date: Option<String>,
    pub track_count: u32,
    pub release_kind: ReleaseKind,
    pub discovery_method: DiscoveryMethod,
    pub provider_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Running,
    Completed,
    Cancelled,
    Aborted,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Running => "running",
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Aborted => "aborted",
            RunOutcome::Failed => "failed",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunOutcome::Running),
            "completed" => Ok(RunOutcome::Completed),
            "cancelled" => Ok(RunOutcome::Cancelled),
            "aborted" => Ok(RunOutcome::Aborted),
            "failed" => Ok(RunOutcome::Failed),
            other => Err(format!("Unknown run outcome: {}", other)),
        }
    }
}

/// One row of pipeline execution history.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestRun {
    pub id: i64,
    pub mode: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub outcome: RunOutcome,
    pub stats_json: Option<String>,
}
