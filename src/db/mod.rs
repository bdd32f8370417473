//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for:
//! - the namespace of directories and rooms (path-addressed)
//! - per-room append-only message logs
//! - per-owner profiles (token → display name)

mod configs;
mod messages;
mod models;
mod nodes;

pub use configs::ConfigRepository;
pub use messages::MessageRepository;
pub use models::{ConfigRecord, MessageRecord, NodeKind, NodeRecord};
pub use nodes::NodeRepository;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("cannot move a directory beneath itself")]
    MoveIntoSelf,
    #[error("invalid pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, bootstrapping the schema if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // In-memory database with shared cache for connection pool compatibility
            let options = SqliteConnectOptions::new()
                .filename("file::memory:")
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::bootstrap_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Apply the bundled DDL when the schema is absent, and seed the root
    /// directory. The DDL runs in a single transaction.
    async fn bootstrap_schema(pool: &SqlitePool) -> Result<(), DbError> {
        async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap_or(false)
        }

        if !table_exists(pool, "users").await {
            Self::run_migration_file(pool, include_str!("../../migrations/001_init.sql")).await?;
            info!("Database schema applied (001_init)");
        } else {
            info!("Database already initialized");
        }

        // Root directory: id 1, path "/", no parent, no owner.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO directories (id, parent_id, name, path, owner_token, created_at)
            VALUES (1, NULL, '/', '/', NULL, ?)
            "#,
        )
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Run a single migration file, executing each statement inside one
    /// transaction so a partial failure leaves the store unchanged.
    async fn run_migration_file(pool: &SqlitePool, migration: &str) -> Result<(), DbError> {
        let mut tx = pool.begin().await?;

        for statement in migration.split(';') {
            // Strip comment-only and empty lines to get actual SQL
            let sql_lines: Vec<&str> = statement
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with("--"))
                .collect();

            if sql_lines.is_empty() {
                continue;
            }

            let sql = sql_lines.join("\n");
            sqlx::query(&sql).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get node repository.
    pub fn nodes(&self) -> NodeRepository<'_> {
        NodeRepository::new(&self.pool)
    }

    /// Get message repository.
    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.pool)
    }

    /// Get config repository.
    pub fn configs(&self) -> ConfigRepository<'_> {
        ConfigRepository::new(&self.pool)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::scratch_db;
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_seeds_root() {
        let (_dir, db) = scratch_db().await;

        let root = db.nodes().get_node_by_path("/").await.unwrap();
        assert_eq!(root.id, 1);
        assert_eq!(root.path, "/");
        assert_eq!(root.kind, NodeKind::Directory);
        assert!(root.owner_token.is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(path).await.unwrap();
            db.configs().create_config("t1", "alice").await.unwrap();
        }

        // Reopening must keep existing data and not re-run the DDL destructively.
        let db = Database::new(path).await.unwrap();
        let config = db.configs().get_config("t1").await.unwrap();
        assert_eq!(config.display_name, "alice");

        let root = db.nodes().get_node_by_path("/").await.unwrap();
        assert_eq!(root.id, 1);
    }
}
