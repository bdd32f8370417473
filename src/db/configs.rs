//! Config repository: per-owner profiles keyed by token.

use super::DbError;
use super::models::ConfigRecord;
use sqlx::SqlitePool;

/// Repository for profile operations.
pub struct ConfigRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ConfigRepository<'a> {
    /// Create a new config repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the profile for a token.
    pub async fn get_config(&self, owner_token: &str) -> Result<ConfigRecord, DbError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT token, display_name FROM users WHERE token = ?")
                .bind(owner_token)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(owner_token, display_name)| ConfigRecord {
            owner_token,
            display_name,
        })
        .ok_or(DbError::NotFound)
    }

    /// Create a profile. Profiles are created at first use; the primary key
    /// violation on a second attempt surfaces as AlreadyExists.
    pub async fn create_config(
        &self,
        owner_token: &str,
        display_name: &str,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO users (token, display_name, created_at) VALUES (?, ?, ?)")
            .bind(owner_token)
            .bind(display_name)
            .bind(chrono::Utc::now().timestamp())
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return DbError::AlreadyExists;
                }
                DbError::from(e)
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::scratch_db;
    use crate::db::DbError;

    #[tokio::test]
    async fn test_config_round_trip() {
        let (_dir, db) = scratch_db().await;

        assert!(matches!(
            db.configs().get_config("t1").await,
            Err(DbError::NotFound)
        ));

        db.configs().create_config("t1", "alice").await.unwrap();
        let config = db.configs().get_config("t1").await.unwrap();
        assert_eq!(config.owner_token, "t1");
        assert_eq!(config.display_name, "alice");
    }

    #[tokio::test]
    async fn test_create_config_is_first_use_only() {
        let (_dir, db) = scratch_db().await;

        db.configs().create_config("t1", "alice").await.unwrap();
        assert!(matches!(
            db.configs().create_config("t1", "alice2").await,
            Err(DbError::AlreadyExists)
        ));

        // The original profile is unchanged.
        let config = db.configs().get_config("t1").await.unwrap();
        assert_eq!(config.display_name, "alice");
    }
}
