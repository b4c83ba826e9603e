//! Version-tracked migrations for the checkpoint database.
//!
//! Every store open calls [`run_migrations`]; versions already listed in
//! `_migrations` are skipped.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "checkpoints",
    sql: r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            thread_id TEXT PRIMARY KEY,
            checkpoint_id TEXT NOT NULL,
            state TEXT NOT NULL,
            resume_at TEXT,
            pending TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checkpoints_created ON checkpoints(created_at);
    "#,
}];

const LEDGER_SQL: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

fn migration_error(context: &'static str) -> impl Fn(libsql::Error) -> DatabaseError {
    move |e| DatabaseError::Migration(format!("{context}: {e}"))
}

/// Bring the checkpoint schema up to the newest version.
///
/// Each pending migration and its `_migrations` row commit together.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(LEDGER_SQL, ())
        .await
        .map_err(migration_error("creating the _migrations ledger"))?;

    let applied = applied_version(conn).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Upgrading checkpoint schema"
        );
        let batch = format!(
            "BEGIN;\n{}\nINSERT INTO _migrations (version, name) VALUES ({}, '{}');\nCOMMIT;",
            migration.sql, migration.version, migration.name
        );
        if let Err(e) = conn.execute_batch(&batch).await {
            // Nothing to roll back when BEGIN itself failed.
            let _ = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::Migration(format!(
                "checkpoint schema V{} ({}): {e}",
                migration.version, migration.name
            )));
        }
    }
    Ok(())
}

/// Newest version recorded in `_migrations`; 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(migration_error("reading the schema version"))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(migration_error("reading the schema version"))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(migration_error("decoding the schema version"))
}
