//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "jobs_and_events",
        sql: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                job_id TEXT,
                company TEXT,
                role TEXT,
                stage TEXT NOT NULL DEFAULT 'Applied',
                source TEXT NOT NULL DEFAULT 'Manual',
                thread_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_updated ON jobs(pk, updated_at);

            CREATE TABLE IF NOT EXISTS events (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                event_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                event_type TEXT NOT NULL DEFAULT 'Update',
                summary TEXT,
                source TEXT NOT NULL DEFAULT 'manual',
                message_id TEXT,
                thread_id TEXT,
                sender TEXT,
                subject TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "claims_and_tokens",
        sql: r#"
            CREATE TABLE IF NOT EXISTS processed_emails (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                message_id TEXT NOT NULL,
                claimed_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            );
            CREATE INDEX IF NOT EXISTS idx_processed_emails_expiry
                ON processed_emails(expires_at);

            CREATE TABLE IF NOT EXISTS user_tokens (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (pk, sk)
            );
        "#,
    },
];

/// Apply every migration newer than the recorded version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::debug!(version, "Database migrations complete");
    Ok(())
}

/// Highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
