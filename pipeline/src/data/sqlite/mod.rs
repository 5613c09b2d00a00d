//! SQLite database service
//!
//! The single relational store behind every pipeline layer:
//! - WAL mode so read accessors never block a running stage
//! - busy timeout so concurrent batch runs wait for the writer lock
//! - foreign keys on, which the layer cascades depend on
//!
//! All schema definitions and migrations are managed here.

pub mod error;
mod migrations;
pub mod repositories;
pub mod schema;

pub use error::SqliteError;
pub use migrations::current_version;
pub use sqlx::SqlitePool;

use std::path::Path;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::core::config::DatabaseConfig;
use crate::core::constants::{SQLITE_CACHE_SIZE, SQLITE_DB_FILENAME, SQLITE_WAL_AUTOCHECKPOINT};
use crate::core::storage::{AppStorage, DataSubdir};

/// SQLite database service
///
/// Created once per process and shared (behind `Arc`) by every stage.
pub struct SqliteService {
    pool: SqlitePool,
}

impl SqliteService {
    /// Initialize the database inside the application data directory
    pub async fn init(storage: &AppStorage, config: &DatabaseConfig) -> Result<Self, SqliteError> {
        let db_path = storage.subdir_path(DataSubdir::Sqlite, SQLITE_DB_FILENAME);
        Self::init_at(&db_path, config).await
    }

    /// Initialize the database at an explicit file path
    ///
    /// Creates the file if it doesn't exist, configures connection options
    /// and runs any pending migrations.
    pub async fn init_at(db_path: &Path, config: &DatabaseConfig) -> Result<Self, SqliteError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .pragma("cache_size", SQLITE_CACHE_SIZE)
            .pragma("temp_store", "MEMORY")
            .pragma("wal_autocheckpoint", SQLITE_WAL_AUTOCHECKPOINT)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;

        tracing::debug!(path = %db_path.display(), "SqliteService initialized");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a SqliteService from an existing pool (primarily for testing)
    #[cfg(test)]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn checkpoint(&self) -> Result<(), SqliteError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        tracing::debug!("WAL checkpoint completed");
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
    }
}

/// Single-connection in-memory pool with the schema applied
///
/// One connection only: every `:memory:` connection is its own database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(":memory:")
        .await
        .unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    pool
}
