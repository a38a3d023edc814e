use std::collections::HashSet;

use libsql::{Connection, params};
use types::StoreError;

const MIGRATION_BOOKKEEPING_TABLE: &str = "store_migrations";
pub(crate) const REQUIRED_TABLES: &[&str] = &[
    MIGRATION_BOOKKEEPING_TABLE,
    "sessions",
    "conversation_turns",
    "user_feedback",
    "faq_entries",
];
pub(crate) const REQUIRED_INDEXES: &[&str] = &[
    "idx_sessions_status_activity",
    "idx_user_feedback_session",
];

#[derive(Debug, Clone, Copy)]
pub(crate) struct Migration {
    pub(crate) version: &'static str,
    pub(crate) sql: &'static str,
}

pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_create_sessions_table",
        sql: include_str!("../migrations/0001_create_sessions_table.sql"),
    },
    Migration {
        version: "0002_create_conversation_turns_table",
        sql: include_str!("../migrations/0002_create_conversation_turns_table.sql"),
    },
    Migration {
        version: "0003_create_user_feedback_table",
        sql: include_str!("../migrations/0003_create_user_feedback_table.sql"),
    },
    Migration {
        version: "0004_create_faq_entries_table",
        sql: include_str!("../migrations/0004_create_faq_entries_table.sql"),
    },
    Migration {
        version: "0005_create_sessions_status_activity_index",
        sql: include_str!("../migrations/0005_create_sessions_status_activity_index.sql"),
    },
    Migration {
        version: "0006_create_user_feedback_session_index",
        sql: include_str!("../migrations/0006_create_user_feedback_session_index.sql"),
    },
];

pub(crate) async fn rollback_quietly(conn: &Connection) {
    let _ = conn.execute("ROLLBACK TRANSACTION", params![]).await;
}

pub(crate) async fn enable_foreign_keys(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("PRAGMA foreign_keys = ON", params![])
        .await
        .map_err(|error| StoreError::initialization(error.to_string()))?;
    // busy_timeout is per-connection and returns a row, hence query().
    let mut rows = conn
        .query("PRAGMA busy_timeout = 5000", params![])
        .await
        .map_err(|error| StoreError::initialization(error.to_string()))?;
    let _ = rows.next().await;
    Ok(())
}

/// Switch a local database to WAL journaling.
///
/// `journal_mode` persists in the database file, so this runs once during
/// initialisation. Remote databases manage their own journal.
pub(crate) async fn enable_wal_mode(conn: &Connection) -> Result<(), StoreError> {
    let mut rows = conn
        .query("PRAGMA journal_mode = WAL", params![])
        .await
        .map_err(|error| StoreError::initialization(format!("failed to enable WAL mode: {error}")))?;
    let _ = rows.next().await;
    Ok(())
}

pub(crate) async fn ensure_migration_bookkeeping(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS store_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        params![],
    )
    .await
    .map_err(|error| StoreError::migration(error.to_string()))?;
    Ok(())
}

pub(crate) async fn run_pending_migrations(conn: &Connection) -> Result<usize, StoreError> {
    let applied_versions = applied_migration_versions(conn).await?;
    let mut applied_now = 0_usize;
    for migration in MIGRATIONS {
        if applied_versions.contains(migration.version) {
            continue;
        }

        conn.execute("BEGIN IMMEDIATE TRANSACTION", params![])
            .await
            .map_err(|error| StoreError::migration(error.to_string()))?;
        let migration_result = async {
            conn.execute_batch(migration.sql)
                .await
                .map_err(|error| StoreError::migration(format!("{}: {error}", migration.version)))?;
            conn.execute(
                "INSERT INTO store_migrations (version) VALUES (?1)",
                params![migration.version],
            )
            .await
            .map_err(|error| StoreError::migration(error.to_string()))?;
            Ok::<(), StoreError>(())
        }
        .await;
        if let Err(error) = migration_result {
            rollback_quietly(conn).await;
            return Err(error);
        }
        conn.execute("COMMIT TRANSACTION", params![])
            .await
            .map_err(|error| StoreError::migration(error.to_string()))?;
        tracing::debug!(version = migration.version, "applied store migration");
        applied_now += 1;
    }
    Ok(applied_now)
}

pub(crate) async fn applied_migration_versions(
    conn: &Connection,
) -> Result<HashSet<String>, StoreError> {
    let mut rows = conn
        .query(
            "SELECT version FROM store_migrations ORDER BY version ASC",
            params![],
        )
        .await
        .map_err(|error| StoreError::migration(error.to_string()))?;

    let mut versions = HashSet::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|error| StoreError::migration(error.to_string()))?
    {
        let version = row
            .get::<String>(0)
            .map_err(|error| StoreError::migration(error.to_string()))?;
        versions.insert(version);
    }
    Ok(versions)
}

pub(crate) async fn verify_required_schema(conn: &Connection) -> Result<(), StoreError> {
    for table in REQUIRED_TABLES {
        if !schema_exists(conn, "table", table).await? {
            return Err(StoreError::initialization(format!(
                "required table `{table}` is missing after migration"
            )));
        }
    }
    for index in REQUIRED_INDEXES {
        if !schema_exists(conn, "index", index).await? {
            return Err(StoreError::initialization(format!(
                "required index `{index}` is missing after migration"
            )));
        }
    }
    Ok(())
}

pub(crate) async fn schema_exists(
    conn: &Connection,
    schema_type: &str,
    object_name: &str,
) -> Result<bool, StoreError> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![schema_type, object_name],
        )
        .await
        .map_err(|error| StoreError::initialization(error.to_string()))?;
    rows.next()
        .await
        .map(|row| row.is_some())
        .map_err(|error| StoreError::initialization(error.to_string()))
}
