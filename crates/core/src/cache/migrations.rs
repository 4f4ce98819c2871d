//! Database schema migrations.
//!
//! A `_migrations` table records which numbered SQL batches have run.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// A single schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Applied in ascending `version` order. Every batch uses
/// `CREATE ... IF NOT EXISTS` so a partially recorded run can be replayed.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "cache_entries", sql: include_str!("../../migrations/001_cache_entries.sql") },
    Migration { version: 2, name: "settings", sql: include_str!("../../migrations/002_settings.sql") },
];

/// Run any pending migrations.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<Vec<&'static str>, Error> {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                )",
                [],
            )?;

            let current: i64 =
                conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

            let mut applied = Vec::new();
            for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
                let tx = conn.transaction()?;
                tx.execute_batch(migration.sql)
                    .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
                tx.execute(
                    "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                    params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                applied.push(migration.name);
            }

            Ok(applied)
        })
        .await
        .map_err(Error::from)?;

    if !applied.is_empty() {
        tracing::info!(?applied, "applied schema migrations");
    }

    Ok(())
}
