//! SQLite-backed implementation of [`HarvestStore`].

use super::models::{
    name_key, DiscoveryMethod, Group, GroupProfile, HarvestRun, Quarantine, Release, ReleaseKind,
    RunOutcome,
};
use super::schema::HARVEST_VERSIONED_SCHEMAS;
use super::trait_def::{
    GroupFilter, GroupedCount, HarvestStore, ReleaseFilter, ReleaseGrouping,
};
use crate::sqlite_persistence::{initialize_or_migrate, open_database};
use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const GROUP_COLUMNS: &str = "id, external_id, name, genres, popularity, followers, provider_url, \
     image_url, active, quarantine_reason, quarantine_since, quarantine_retry_after, \
     discovery_source, last_validated_at, created_at, updated_at";

const RELEASE_COLUMNS: &str = "id, external_id, group_id, name, release_date, track_count, \
     release_kind, discovery_method, provider_url, image_url, created_at, updated_at";

/// WHERE clause fragments plus their positional parameters.
struct SqlFilter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl SqlFilter {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, clause: &str, value: Value) {
        self.values.push(value);
        self.clauses
            .push(clause.replace('?', &format!("?{}", self.values.len())));
    }

    fn push_bare(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn group_filter_sql(filter: &GroupFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    if let Some(id) = filter.id {
        sql.push("id = ?", Value::Integer(id));
    }
    if let Some(external_id) = &filter.external_id {
        sql.push("external_id = ?", Value::Text(external_id.clone()));
    }
    if let Some(name) = &filter.name {
        sql.push("name_key = ?", Value::Text(name_key(name)));
    }
    if let Some(active) = filter.active {
        sql.push("active = ?", Value::Integer(active as i64));
    }
    match filter.has_external_id {
        Some(true) => sql.push_bare("external_id IS NOT NULL"),
        Some(false) => sql.push_bare("external_id IS NULL"),
        None => {}
    }
    if let Some(now) = filter.eligible_at {
        sql.push(
            "(active = 1 AND (quarantine_retry_after IS NULL OR quarantine_retry_after <= ?))",
            Value::Integer(now),
        );
    }
    match filter.quarantined {
        Some(true) => sql.push_bare("(active = 1 AND quarantine_retry_after IS NOT NULL)"),
        Some(false) => sql.push_bare("quarantine_retry_after IS NULL"),
        None => {}
    }
    if let Some(cutoff) = filter.inactive_before {
        sql.push(
            "(active = 0 AND quarantine_since IS NOT NULL AND quarantine_since < ?)",
            Value::Integer(cutoff),
        );
    }
    sql
}

fn release_filter_sql(filter: &ReleaseFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    if let Some(id) = filter.id {
        sql.push("id = ?", Value::Integer(id));
    }
    if let Some(external_id) = &filter.external_id {
        sql.push("external_id = ?", Value::Text(external_id.clone()));
    }
    if let Some(group_id) = filter.group_id {
        sql.push("group_id = ?", Value::Integer(group_id));
    }
    if let Some(name) = &filter.name {
        sql.push("name_key = ?", Value::Text(name_key(name)));
    }
    if let Some(names) = &filter.name_in {
        if names.is_empty() {
            sql.push_bare("0");
        } else {
            let mut placeholders = Vec::with_capacity(names.len());
            for name in names {
                sql.values.push(Value::Text(name_key(name)));
                placeholders.push(format!("?{}", sql.values.len()));
            }
            sql.push_bare(&format!("name_key IN ({})", placeholders.join(", ")));
        }
    }
    if let Some(method) = filter.discovery_method {
        sql.push(
            "discovery_method = ?",
            Value::Text(method.as_str().to_string()),
        );
    }
    sql
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn opt_int(value: Option<i64>) -> Value {
    match value {
        Some(v) => Value::Integer(v),
        None => Value::Null,
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

pub struct SqliteHarvestStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHarvestStore {
    /// Opens or creates the harvest database at `db_path`, migrating it if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path.as_ref(), HARVEST_VERSIONED_SCHEMAS)
            .context("Failed to open harvest database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_or_migrate(&conn, HARVEST_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn group_values(group: &Group) -> Result<Vec<Value>> {
        let profile = &group.profile;
        let genres = serde_json::to_string(&profile.genres)?;
        let quarantine = group.quarantine.as_ref();
        Ok(vec![
            opt_text(&profile.external_id),
            Value::Text(profile.name.trim().to_string()),
            Value::Text(name_key(&profile.name)),
            Value::Text(genres),
            Value::Integer(profile.popularity as i64),
            Value::Integer(profile.followers as i64),
            opt_text(&profile.provider_url),
            opt_text(&profile.image_url),
            Value::Integer(group.active as i64),
            opt_text(&quarantine.map(|q| q.reason.clone())),
            opt_int(quarantine.map(|q| q.since)),
            opt_int(quarantine.and_then(|q| q.retry_after)),
            opt_text(&group.discovery_source),
            opt_int(group.last_validated_at),
            Value::Integer(group.created_at),
            Value::Integer(group.updated_at),
        ])
    }

    fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<Group> {
        let genres_json: String = row.get("genres")?;
        let genres: Vec<String> = serde_json::from_str(&genres_json)
            .map_err(|e| conversion_error(3, format!("Invalid genres JSON: {}", e)))?;
        let quarantine = match row.get::<_, Option<String>>("quarantine_reason")? {
            Some(reason) => Some(Quarantine {
                reason,
                since: row.get::<_, Option<i64>>("quarantine_since")?.unwrap_or(0),
                retry_after: row.get("quarantine_retry_after")?,
            }),
            None => None,
        };

        Ok(Group {
            id: row.get("id")?,
            profile: GroupProfile {
                external_id: row.get("external_id")?,
                name: row.get("name")?,
                genres,
                popularity: row.get::<_, i64>("popularity")? as u32,
                followers: row.get::<_, i64>("followers")? as u64,
                provider_url: row.get("provider_url")?,
                image_url: row.get("image_url")?,
            },
            active: row.get::<_, i64>("active")? != 0,
            quarantine,
            discovery_source: row.get("discovery_source")?,
            last_validated_at: row.get("last_validated_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn release_values(release: &Release) -> Vec<Value> {
        vec![
            opt_text(&release.external_id),
            Value::Integer(release.group_id),
            Value::Text(release.name.trim().to_string()),
            Value::Text(name_key(&release.name)),
            opt_text(&release.release_date),
            Value::Integer(release.track_count as i64),
            Value::Text(release.release_kind.as_str().to_string()),
            Value::Text(release.discovery_method.as_str().to_string()),
            opt_text(&release.provider_url),
            opt_text(&release.image_url),
            Value::Integer(release.created_at),
            Value::Integer(release.updated_at),
        ]
    }

    fn row_to_release(row: &rusqlite::Row) -> rusqlite::Result<Release> {
        let kind: String = row.get("release_kind")?;
        let method: String = row.get("discovery_method")?;
        Ok(Release {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            group_id: row.get("group_id")?,
            name: row.get("name")?,
            release_date: row.get("release_date")?,
            track_count: row.get::<_, i64>("track_count")? as u32,
            release_kind: kind
                .parse::<ReleaseKind>()
                .map_err(|e| conversion_error(6, e))?,
            discovery_method: method
                .parse::<DiscoveryMethod>()
                .map_err(|e| conversion_error(7, e))?,
            provider_url: row.get("provider_url")?,
            image_url: row.get("image_url")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<HarvestRun> {
        let outcome: String = row.get("outcome")?;
        Ok(HarvestRun {
            id: row.get("id")?,
            mode: row.get("mode")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            outcome: outcome.parse().unwrap_or(RunOutcome::Failed),
            stats_json: row.get("stats_json")?,
        })
    }

    fn count(&self, table: &str, filter: &SqlFilter) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", table, filter.where_sql()),
            params_from_iter(filter.values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete(&self, table: &str, filter: &SqlFilter) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            &format!("DELETE FROM {}{}", table, filter.where_sql()),
            params_from_iter(filter.values.iter()),
        )?;
        Ok(deleted)
    }
}

impl HarvestStore for SqliteHarvestStore {
    fn find_group(&self, filter: &GroupFilter) -> Result<Option<Group>> {
        let sql = group_filter_sql(filter);
        let conn = self.conn.lock().unwrap();
        let group = conn
            .query_row(
                &format!(
                    "SELECT {} FROM groups{} ORDER BY id LIMIT 1",
                    GROUP_COLUMNS,
                    sql.where_sql()
                ),
                params_from_iter(sql.values.iter()),
                Self::row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    fn find_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let sql = group_filter_sql(filter);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM groups{} ORDER BY id",
            GROUP_COLUMNS,
            sql.where_sql()
        ))?;
        let groups = stmt
            .query_map(params_from_iter(sql.values.iter()), Self::row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn insert_group(&self, group: &Group) -> Result<i64> {
        let values = Self::group_values(group)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO groups (external_id, name, name_key, genres, popularity, followers, \
             provider_url, image_url, active, quarantine_reason, quarantine_since, \
             quarantine_retry_after, discovery_source, last_validated_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params_from_iter(values.iter()),
        )
        .with_context(|| format!("Failed to insert group {:?}", group.profile.name))?;
        Ok(conn.last_insert_rowid())
    }

    fn replace_group(&self, group: &Group) -> Result<()> {
        let mut values = Self::group_values(group)?;
        values.push(Value::Integer(group.id));
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE groups SET external_id = ?1, name = ?2, name_key = ?3, genres = ?4, \
                 popularity = ?5, followers = ?6, provider_url = ?7, image_url = ?8, active = ?9, \
                 quarantine_reason = ?10, quarantine_since = ?11, quarantine_retry_after = ?12, \
                 discovery_source = ?13, last_validated_at = ?14, created_at = ?15, \
                 updated_at = ?16 WHERE id = ?17",
                params_from_iter(values.iter()),
            )
            .with_context(|| format!("Failed to replace group {}", group.id))?;
        if updated == 0 {
            anyhow::bail!("Group {} does not exist", group.id);
        }
        Ok(())
    }

    fn delete_groups(&self, filter: &GroupFilter) -> Result<usize> {
        self.delete("groups", &group_filter_sql(filter))
    }

    fn count_groups(&self, filter: &GroupFilter) -> Result<u64> {
        self.count("groups", &group_filter_sql(filter))
    }

    fn find_release(&self, filter: &ReleaseFilter) -> Result<Option<Release>> {
        let sql = release_filter_sql(filter);
        let conn = self.conn.lock().unwrap();
        let release = conn
            .query_row(
                &format!(
                    "SELECT {} FROM releases{} ORDER BY id LIMIT 1",
                    RELEASE_COLUMNS,
                    sql.where_sql()
                ),
                params_from_iter(sql.values.iter()),
                Self::row_to_release,
            )
            .optional()?;
        Ok(release)
    }

    fn find_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>> {
        let sql = release_filter_sql(filter);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM releases{} ORDER BY id",
            RELEASE_COLUMNS,
            sql.where_sql()
        ))?;
        let releases = stmt
            .query_map(params_from_iter(sql.values.iter()), Self::row_to_release)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(releases)
    }

    fn insert_release(&self, release: &Release) -> Result<i64> {
        let values = Self::release_values(release);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO releases (external_id, group_id, name, name_key, release_date, \
             track_count, release_kind, discovery_method, provider_url, image_url, created_at, \
             updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params_from_iter(values.iter()),
        )
        .with_context(|| format!("Failed to insert release {:?}", release.name))?;
        Ok(conn.last_insert_rowid())
    }

    fn replace_release(&self, release: &Release) -> Result<()> {
        let mut values = Self::release_values(release);
        values.push(Value::Integer(release.id));
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE releases SET external_id = ?1, group_id = ?2, name = ?3, name_key = ?4, \
                 release_date = ?5, track_count = ?6, release_kind = ?7, discovery_method = ?8, \
                 provider_url = ?9, image_url = ?10, created_at = ?11, updated_at = ?12 \
                 WHERE id = ?13",
                params_from_iter(values.iter()),
            )
            .with_context(|| format!("Failed to replace release {}", release.id))?;
        if updated == 0 {
            anyhow::bail!("Release {} does not exist", release.id);
        }
        Ok(())
    }

    fn delete_releases(&self, filter: &ReleaseFilter) -> Result<usize> {
        self.delete("releases", &release_filter_sql(filter))
    }

    fn count_releases(&self, filter: &ReleaseFilter) -> Result<u64> {
        self.count("releases", &release_filter_sql(filter))
    }

    fn count_releases_grouped(
        &self,
        grouping: ReleaseGrouping,
        limit: Option<usize>,
    ) -> Result<Vec<GroupedCount>> {
        let base = match grouping {
            ReleaseGrouping::DiscoveryMethod => {
                "SELECT discovery_method AS k, COUNT(*) AS c FROM releases GROUP BY discovery_method"
            }
            ReleaseGrouping::ReleaseKind => {
                "SELECT release_kind AS k, COUNT(*) AS c FROM releases GROUP BY release_kind"
            }
            ReleaseGrouping::Group => {
                "SELECT g.name AS k, COUNT(*) AS c FROM releases r \
                 JOIN groups g ON g.id = r.group_id GROUP BY r.group_id"
            }
        };
        let mut sql = format!("{} ORDER BY c DESC, k ASC", base);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map([], |row| {
                Ok(GroupedCount {
                    key: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    fn record_run_start(&self, mode: &str, started_at: i64) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO harvest_runs (mode, started_at, outcome) VALUES (?1, ?2, ?3)",
            params![mode, started_at, RunOutcome::Running.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_run_finish(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        finished_at: i64,
        stats_json: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE harvest_runs SET outcome = ?1, finished_at = ?2, stats_json = ?3 WHERE id = ?4",
            params![outcome.as_str(), finished_at, stats_json, run_id],
        )?;
        Ok(())
    }

    fn last_run(&self) -> Result<Option<HarvestRun>> {
        let conn = self.conn.lock().unwrap();
        let run = conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, outcome, stats_json \
                 FROM harvest_runs ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                Self::row_to_run,
            )
            .optional()?;
        Ok(run)
    }
}
