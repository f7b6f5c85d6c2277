//! Repository for the `projects` table.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::project::{ProjectHeadRow, ProjectRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, title, created, path, assets, render_seq";

/// Provides CRUD operations for projects. Every query is scoped by owner.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project for `user_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        title: &str,
        path: &str,
    ) -> Result<ProjectRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (id, user_id, title, path)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(user_id)
            .bind(title)
            .bind(path)
            .fetch_one(pool)
            .await
    }

    /// Find a project owned by `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Client-visible columns of every project owned by `user_id`, oldest first.
    pub async fn list_heads(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<ProjectHeadRow>, sqlx::Error> {
        sqlx::query_as::<_, ProjectHeadRow>(
            "SELECT id, title, created FROM projects
             WHERE user_id = $1
             ORDER BY created ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
    }

    /// Rename a project. Returns `false` if the owner has no such project.
    pub async fn rename(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE projects SET title = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .bind(title)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a project and, by cascade, its renders.
    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reserve the next render sequence number for a project.
    ///
    /// Returns the project title and the reserved number, or `None` if the
    /// owner has no such project. The row lock is held until the caller's
    /// transaction ends, so concurrent dispatches get distinct numbers.
    pub async fn next_render_seq(
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            "UPDATE projects SET render_seq = render_seq + 1
             WHERE id = $1 AND user_id = $2
             RETURNING title, render_seq",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
    }
}
