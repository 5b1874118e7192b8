//! SQLite schema for the harvest database.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};
use anyhow::{Context, Result};
use rusqlite::Connection;

const GROUP_FK: ForeignKey = ForeignKey {
    foreign_table: "groups",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const GROUPS_TABLE_V1: Table = Table {
    name: "groups",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("external_id", SqlType::Text, is_unique = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("name_key", SqlType::Text, non_null = true, is_unique = true),
        // JSON array
        sqlite_column!("genres", SqlType::Text, non_null = true),
        sqlite_column!("popularity", SqlType::Integer, non_null = true),
        sqlite_column!("followers", SqlType::Integer, non_null = true),
        sqlite_column!("provider_url", SqlType::Text),
        sqlite_column!("image_url", SqlType::Text),
        sqlite_column!("active", SqlType::Integer, non_null = true),
        sqlite_column!("quarantine_reason", SqlType::Text),
        sqlite_column!("quarantine_since", SqlType::Integer),
        sqlite_column!("quarantine_retry_after", SqlType::Integer),
        sqlite_column!("discovery_source", SqlType::Text),
        sqlite_column!("last_validated_at", SqlType::Integer),
        sqlite_column!("created_at", SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_groups_active_retry", "active, quarantine_retry_after")],
    unique_constraints: &[],
};

const RELEASES_TABLE_V1: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("external_id", SqlType::Text, is_unique = true),
        sqlite_column!(
            "group_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GROUP_FK)
        ),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("name_key", SqlType::Text, non_null = true),
        sqlite_column!("release_date", SqlType::Text),
        sqlite_column!("track_count", SqlType::Integer, non_null = true),
        sqlite_column!("release_kind", SqlType::Text, non_null = true),
        sqlite_column!("discovery_method", SqlType::Text, non_null = true),
        sqlite_column!("provider_url", SqlType::Text),
        sqlite_column!("image_url", SqlType::Text),
        sqlite_column!("created_at", SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_releases_group_name", "group_id, name_key"),
        ("idx_releases_discovery_method", "discovery_method"),
    ],
    unique_constraints: &[],
};

/// Release identity is scoped to the owning group: a release credited to two
/// groups is stored once for each.
const RELEASES_TABLE_V2: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("external_id", SqlType::Text),
        sqlite_column!(
            "group_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GROUP_FK)
        ),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("name_key", SqlType::Text, non_null = true),
        sqlite_column!("release_date", SqlType::Text),
        sqlite_column!("track_count", SqlType::Integer, non_null = true),
        sqlite_column!("release_kind", SqlType::Text, non_null = true),
        sqlite_column!("discovery_method", SqlType::Text, non_null = true),
        sqlite_column!("provider_url", SqlType::Text),
        sqlite_column!("image_url", SqlType::Text),
        sqlite_column!("created_at", SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_releases_group_name", "group_id, name_key"),
        ("idx_releases_discovery_method", "discovery_method"),
    ],
    unique_constraints: &[&["group_id", "external_id"]],
};

/// SQLite cannot drop a column constraint, so the table is rebuilt. Columns
/// keep their order, which lets the rows be copied as they are.
fn migrate_release_identity_to_group(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP INDEX idx_releases_group_name;
         DROP INDEX idx_releases_discovery_method;
         ALTER TABLE releases RENAME TO releases_v1;",
    )
    .context("Failed to set aside v1 releases table")?;
    RELEASES_TABLE_V2.create(conn)?;
    conn.execute_batch(
        "INSERT INTO releases SELECT * FROM releases_v1;
         DROP TABLE releases_v1;",
    )
    .context("Failed to copy releases into v2 table")?;
    Ok(())
}

/// One row per pipeline execution.
const HARVEST_RUNS_TABLE_V1: Table = Table {
    name: "harvest_runs",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("mode", SqlType::Text, non_null = true),
        sqlite_column!("started_at", SqlType::Integer, non_null = true),
        sqlite_column!("finished_at", SqlType::Integer),
        sqlite_column!("outcome", SqlType::Text, non_null = true),
        sqlite_column!("stats_json", SqlType::Text),
    ],
    indices: &[("idx_harvest_runs_started", "started_at DESC")],
    unique_constraints: &[],
};

pub const HARVEST_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[GROUPS_TABLE_V1, RELEASES_TABLE_V1, HARVEST_RUNS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[GROUPS_TABLE_V1, RELEASES_TABLE_V2, HARVEST_RUNS_TABLE_V1],
        migration: Some(migrate_release_identity_to_group),
    },
];
