mod embedding;
mod faq_index;
mod schema;
mod sessions;

use std::path::Path;

use libsql::{Builder, Connection, Database};
use types::{StoreConfig, StoreError, StoreLocation};

use schema::{
    enable_foreign_keys, enable_wal_mode, ensure_migration_bookkeeping, run_pending_migrations,
    verify_required_schema,
};

pub use embedding::EmbeddingAdapter;

/// libsql-backed persistence for sessions, turns, feedback and the FAQ
/// vector index.
///
/// Holds only the `Database` handle; every operation opens its own
/// connection, so the store is cheap to share behind an `Arc`.
pub struct LibsqlStore {
    db: Database,
}

impl LibsqlStore {
    pub async fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let location = config
            .location()
            .map_err(|error| StoreError::initialization(error.to_string()))?;
        Self::open(location).await
    }

    pub async fn new_local(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(StoreLocation::Local(db_path.as_ref().to_path_buf())).await
    }

    pub async fn new_remote(
        url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::open(StoreLocation::Remote {
            url: url.into(),
            auth_token: auth_token.into(),
        })
        .await
    }

    async fn open(location: StoreLocation) -> Result<Self, StoreError> {
        let (db, is_local) = match location {
            StoreLocation::Local(db_path) => {
                create_parent_directory(&db_path)?;
                let db = Builder::new_local(db_path)
                    .build()
                    .await
                    .map_err(|error| StoreError::connection(error.to_string()))?;
                (db, true)
            }
            StoreLocation::Remote { url, auth_token } => {
                let db = Builder::new_remote(url, auth_token)
                    .build()
                    .await
                    .map_err(|error| StoreError::connection(error.to_string()))?;
                (db, false)
            }
        };

        let store = Self { db };
        store.initialize(is_local).await?;
        Ok(store)
    }

    async fn initialize(&self, is_local: bool) -> Result<(), StoreError> {
        let conn = self.connect()?;
        if is_local {
            enable_wal_mode(&conn).await?;
        }
        enable_foreign_keys(&conn).await?;
        ensure_migration_bookkeeping(&conn).await?;
        let applied = run_pending_migrations(&conn).await?;
        verify_required_schema(&conn).await?;
        tracing::info!(applied_migrations = applied, "store initialized");
        Ok(())
    }

    /// Opens a connection with foreign keys and the busy timeout applied.
    async fn open_connection(&self) -> Result<Connection, StoreError> {
        let conn = self.connect()?;
        enable_foreign_keys(&conn).await?;
        Ok(conn)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        self.db
            .connect()
            .map_err(|error| StoreError::connection(error.to_string()))
    }
}

fn create_parent_directory(db_path: &Path) -> Result<(), StoreError> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|error| {
                StoreError::initialization(format!(
                    "failed to prepare store directory `{}`: {error}",
                    parent.display()
                ))
            }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
