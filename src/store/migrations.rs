//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "sms_pipelines",
        sql: r#"
            CREATE TABLE IF NOT EXISTS sms_pipelines (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS sms_actions (
                id INTEGER PRIMARY KEY,
                pipeline_id INTEGER NOT NULL REFERENCES sms_pipelines(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                component TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                continue_after_processing INTEGER NOT NULL DEFAULT 0,
                is_interaction_logged INTEGER NOT NULL DEFAULT 0,
                settings TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_sms_actions_pipeline ON sms_actions(pipeline_id);
        "#,
    },
    Migration {
        version: 2,
        name: "messaging_consent",
        sql: r#"
            CREATE TABLE IF NOT EXISTS phone_numbers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                person_alias_id INTEGER,
                number TEXT NOT NULL,
                full_number TEXT NOT NULL,
                is_messaging_enabled INTEGER NOT NULL DEFAULT 1,
                is_messaging_opted_out INTEGER NOT NULL DEFAULT 0,
                messaging_opted_out_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_phone_numbers_number ON phone_numbers(number);
            CREATE INDEX IF NOT EXISTS idx_phone_numbers_full_number ON phone_numbers(full_number);

            CREATE TABLE IF NOT EXISTS system_phone_numbers (
                number TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                pipeline_id INTEGER,
                tracking_disabled INTEGER NOT NULL DEFAULT 0,
                auto_reply_suppressed INTEGER NOT NULL DEFAULT 0
            );
        "#,
    },
    Migration {
        version: 3,
        name: "interactions_and_conversations",
        sql: r#"
            CREATE TABLE IF NOT EXISTS interaction_channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                channel_id INTEGER NOT NULL REFERENCES interaction_channels(id),
                component TEXT NOT NULL,
                operation TEXT NOT NULL,
                data TEXT NOT NULL,
                person_alias_id INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_channel ON interactions(channel_id);

            CREATE TABLE IF NOT EXISTS sms_conversation_messages (
                id TEXT PRIMARY KEY,
                from_number TEXT NOT NULL,
                to_number TEXT NOT NULL,
                person_alias_id INTEGER,
                body TEXT NOT NULL,
                attachments TEXT NOT NULL DEFAULT '[]',
                received_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sms_conversation_from
                ON sms_conversation_messages(from_number);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
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
    tracing::info!(version, "Database migrations complete");

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
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
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Record a migration version as applied.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
