//! Node repository: the namespace of directories and rooms.
//!
//! Every node row denormalises its full canonical path, so path resolution is
//! a single equality predicate over the two tables. Mutations that change a
//! node's location update parent id, name, and path (and every descendant's
//! path, for directory moves) in one transaction.

use super::DbError;
use super::models::{NodeKind, NodeRecord};
use sqlx::SqlitePool;

/// Row shape shared by all node queries:
/// (kind, id, name, owner_token, owner display name, created_at, path).
type NodeRow = (
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    i64,
    String,
);

fn into_record(row: NodeRow) -> NodeRecord {
    let (kind, id, name, owner_token, display_name, created_at, path) = row;
    let kind = if kind == "dir" {
        NodeKind::Directory
    } else {
        NodeKind::Room
    };
    NodeRecord {
        id,
        name,
        kind,
        owner_token,
        owner_display_name: display_name.unwrap_or_default(),
        created_at,
        path,
    }
}

/// Map a UNIQUE constraint violation to AlreadyExists.
fn map_unique(e: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return DbError::AlreadyExists;
    }
    DbError::from(e)
}

/// Join a child name onto a parent path.
fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path == "/" {
        format!("/{name}")
    } else {
        format!("{parent_path}/{name}")
    }
}

/// Repository for namespace operations.
pub struct NodeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NodeRepository<'a> {
    /// Create a new node repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve a canonical absolute path to its node.
    pub async fn get_node_by_path(&self, path: &str) -> Result<NodeRecord, DbError> {
        let row: Option<NodeRow> = sqlx::query_as(
            r#"
            SELECT 'dir' AS kind, d.id, d.name, d.owner_token, u.display_name, d.created_at, d.path
            FROM directories d LEFT JOIN users u ON u.token = d.owner_token
            WHERE d.path = ?
            UNION ALL
            SELECT 'room', r.id, r.name, r.owner_token, u.display_name, r.created_at, r.path
            FROM rooms r LEFT JOIN users u ON u.token = r.owner_token
            WHERE r.path = ?
            LIMIT 1
            "#,
        )
        .bind(path)
        .bind(path)
        .fetch_optional(self.pool)
        .await?;

        row.map(into_record).ok_or(DbError::NotFound)
    }

    /// Whether a directory exists at the given path.
    pub async fn check_directory_exists(&self, path: &str) -> Result<bool, DbError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM directories WHERE path = ?)")
                .bind(path)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// List the children of a directory, name-ordered.
    pub async fn list_children(&self, dir_id: i64) -> Result<Vec<NodeRecord>, DbError> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT 'dir' AS kind, d.id, d.name, d.owner_token, u.display_name, d.created_at, d.path
            FROM directories d LEFT JOIN users u ON u.token = d.owner_token
            WHERE d.parent_id = ?
            UNION ALL
            SELECT 'room', r.id, r.name, r.owner_token, u.display_name, r.created_at, r.path
            FROM rooms r LEFT JOIN users u ON u.token = r.owner_token
            WHERE r.directory_id = ?
            ORDER BY name ASC
            "#,
        )
        .bind(dir_id)
        .bind(dir_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(into_record).collect())
    }

    /// Create a directory under the given parent.
    ///
    /// A name never denotes both a directory and a room under one parent, so
    /// the room table is probed inside the same transaction as the insert.
    pub async fn create_directory(
        &self,
        parent_id: i64,
        parent_path: &str,
        name: &str,
        owner_token: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let room_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM rooms WHERE directory_id = ? AND name = ?)",
        )
        .bind(parent_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if room_taken {
            return Err(DbError::AlreadyExists);
        }

        sqlx::query(
            r#"
            INSERT INTO directories (parent_id, name, path, owner_token, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(parent_id)
        .bind(name)
        .bind(child_path(parent_path, name))
        .bind(owner_token)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a directory. Refuses when any child exists at the instant of
    /// the transaction.
    pub async fn delete_directory(&self, id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let children: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM directories WHERE parent_id = ?)
                 + (SELECT COUNT(*) FROM rooms WHERE directory_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if children > 0 {
            return Err(DbError::DirectoryNotEmpty);
        }

        sqlx::query("DELETE FROM directories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Rename and/or reparent a directory, rewriting every descendant path in
    /// the same transaction.
    pub async fn move_directory(
        &self,
        id: i64,
        new_parent_id: i64,
        new_parent_path: &str,
        new_name: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let old_path: Option<String> = sqlx::query_scalar("SELECT path FROM directories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(old_path) = old_path else {
            return Err(DbError::NotFound);
        };

        let new_path = child_path(new_parent_path, new_name);
        let old_prefix = format!("{old_path}/");
        if new_path == old_path || new_path.starts_with(&old_prefix) {
            if new_path != old_path {
                return Err(DbError::MoveIntoSelf);
            }
            // Moving onto itself is a no-op.
            return Ok(());
        }

        let room_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM rooms WHERE directory_id = ? AND name = ?)",
        )
        .bind(new_parent_id)
        .bind(new_name)
        .fetch_one(&mut *tx)
        .await?;
        if room_taken {
            return Err(DbError::AlreadyExists);
        }

        sqlx::query("UPDATE directories SET parent_id = ?, name = ?, path = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(new_name)
            .bind(&new_path)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_unique)?;

        // Rewrite descendant paths in both tables.
        sqlx::query(
            r#"
            UPDATE directories SET path = ? || substr(path, length(?) + 1)
            WHERE substr(path, 1, length(?)) = ?
            "#,
        )
        .bind(&new_path)
        .bind(&old_path)
        .bind(&old_prefix)
        .bind(&old_prefix)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE rooms SET path = ? || substr(path, length(?) + 1)
            WHERE substr(path, 1, length(?)) = ?
            "#,
        )
        .bind(&new_path)
        .bind(&old_path)
        .bind(&old_prefix)
        .bind(&old_prefix)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Create a room under the given parent directory.
    pub async fn create_room(
        &self,
        parent_id: i64,
        parent_path: &str,
        name: &str,
        owner_token: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let dir_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM directories WHERE parent_id = ? AND name = ?)",
        )
        .bind(parent_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if dir_taken {
            return Err(DbError::AlreadyExists);
        }

        sqlx::query(
            r#"
            INSERT INTO rooms (directory_id, name, path, owner_token, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(parent_id)
        .bind(name)
        .bind(child_path(parent_path, name))
        .bind(owner_token)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        tx.commit().await?;
        Ok(())
    }

    /// Create a room as a copy of an existing one, duplicating its entire
    /// message history in the same transaction.
    pub async fn copy_room(
        &self,
        src_id: i64,
        dst_parent_id: i64,
        dst_parent_path: &str,
        name: &str,
        owner_token: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let src_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = ?)")
            .bind(src_id)
            .fetch_one(&mut *tx)
            .await?;
        if !src_exists {
            return Err(DbError::NotFound);
        }

        let dir_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM directories WHERE parent_id = ? AND name = ?)",
        )
        .bind(dst_parent_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if dir_taken {
            return Err(DbError::AlreadyExists);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO rooms (directory_id, name, path, owner_token, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(dst_parent_id)
        .bind(name)
        .bind(child_path(dst_parent_path, name))
        .bind(owner_token)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        let new_room_id = result.last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO messages (room_id, display_name, content, created_at)
            SELECT ?, display_name, content, created_at
            FROM messages WHERE room_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(new_room_id)
        .bind(src_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a room, cascading its messages atomically.
    pub async fn delete_room(&self, id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE room_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Rename and/or reparent a room.
    pub async fn move_room(
        &self,
        id: i64,
        new_parent_id: i64,
        new_parent_path: &str,
        new_name: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let dir_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM directories WHERE parent_id = ? AND name = ?)",
        )
        .bind(new_parent_id)
        .bind(new_name)
        .fetch_one(&mut *tx)
        .await?;
        if dir_taken {
            return Err(DbError::AlreadyExists);
        }

        let result = sqlx::query("UPDATE rooms SET directory_id = ?, name = ?, path = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(new_name)
            .bind(child_path(new_parent_path, new_name))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_unique)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
