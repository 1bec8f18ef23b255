//! Schema versioning for the snapshot database.
//!
//! Applied versions are recorded in `_migrations`; opening a database only
//! runs the versions it has not seen.

use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::StorageError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version. Append only.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "settings",
    sql: r#"
        CREATE TABLE IF NOT EXISTS settings (
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, key)
        );
    "#,
}];

fn migration_err(context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Migration(format!("{context}: {e}"))
}

/// Bring the schema up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| migration_err("creating _migrations", e))?;

    let from = current_version(conn).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > from);

    let mut applied = 0;
    for migration in pending {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying schema migration"
        );
        conn.execute_batch(migration.sql).await.map_err(|e| {
            migration_err(
                &format!("applying V{} {}", migration.version, migration.name),
                e,
            )
        })?;
        record_version(conn, migration).await?;
        applied += 1;
    }

    debug!(from, applied, "Snapshot schema up to date");
    Ok(())
}

/// Highest recorded version; 0 on a fresh database.
async fn current_version(conn: &Connection) -> Result<i64, StorageError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| migration_err("reading schema version", e))?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| migration_err("reading schema version", e))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| migration_err("decoding schema version", e))
}

async fn record_version(conn: &Connection, migration: &Migration) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )
    .await
    .map_err(|e| migration_err(&format!("recording V{}", migration.version), e))?;
    Ok(())
}
