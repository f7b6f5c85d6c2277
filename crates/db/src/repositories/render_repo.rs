//! Repository for the `renders` table.

use archytex_core::project::{Render, RenderProgress};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::render::RenderRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "r.id, r.project_id, r.name, r.status, r.started, r.finished, r.icon";

/// Provides operations on renders. Ownership is checked by joining through
/// `projects.user_id`.
pub struct RenderRepo;

impl RenderRepo {
    /// Insert a render into a project's list.
    pub async fn insert(
        conn: &mut PgConnection,
        project_id: Uuid,
        render: &Render,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO renders (id, project_id, name, status, started, finished, icon)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(render.id.as_uuid())
        .bind(project_id)
        .bind(&render.name)
        .bind(render.status)
        .bind(render.started)
        .bind(render.finished)
        .bind(&render.icon)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Renders of one project in list order (oldest first).
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Vec<RenderRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM renders r
             WHERE r.project_id = $1
             ORDER BY r.started ASC, r.id ASC"
        );
        sqlx::query_as::<_, RenderRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Renders of every project owned by `user_id`, in list order.
    pub async fn list_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<RenderRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM renders r
             JOIN projects p ON p.id = r.project_id
             WHERE p.user_id = $1
             ORDER BY r.started ASC, r.id ASC"
        );
        sqlx::query_as::<_, RenderRow>(&query)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Delete a render. Returns `false` unless the render is in that project
    /// and the project belongs to `user_id`.
    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM renders r USING projects p
             WHERE r.id = $1 AND r.project_id = $2
               AND p.id = r.project_id AND p.user_id = $3",
        )
        .bind(id)
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply worker progress to a render. An absent icon keeps the current one.
    pub async fn update_progress(
        pool: &PgPool,
        user_id: Uuid,
        project_id: Uuid,
        id: Uuid,
        progress: &RenderProgress,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE renders r SET
                status = $4,
                finished = $5,
                icon = COALESCE($6, r.icon)
             FROM projects p
             WHERE r.id = $1 AND r.project_id = $2
               AND p.id = r.project_id AND p.user_id = $3",
        )
        .bind(id)
        .bind(project_id)
        .bind(user_id)
        .bind(progress.status)
        .bind(progress.finished)
        .bind(&progress.icon)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
