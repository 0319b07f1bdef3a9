//! Graph schema migrations
//!
//! Each migration is a numbered SQL batch applied once, inside its own
//! transaction, and recorded in `_migrations`.

use sqlx::SqlitePool;
use tracing::{debug, info};

/// Latest schema version
pub const CURRENT_VERSION: i32 = 2;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// v1: entities keyed by name, edges keyed by (source, target, label)
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS entities (
        name TEXT PRIMARY KEY NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS relationships (
        source_name TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
        target_name TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
        label TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (source_name, target_name, label)
    );

    CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_name);
"#;

/// v2: incoming-edge lookups for neighborhoods
const MIGRATION_V2: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_name);
"#;

const MIGRATIONS: &[(i32, &str, &str)] = &[
    (1, "entities and relationships", MIGRATION_V1),
    (2, "incoming-edge index", MIGRATION_V2),
];

async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;
    if current_version >= CURRENT_VERSION {
        debug!(version = current_version, "Graph schema is up to date");
        return Ok(());
    }

    for &(version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current_version) {
        info!(version, name, "Applying graph schema migration");
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    info!(from = current_version, to = CURRENT_VERSION, "Graph schema migrated");
    Ok(())
}

/// Recorded schema version compared with the latest
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}
