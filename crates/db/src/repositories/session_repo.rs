//! Repository for the `sessions` table.

use archytex_core::types::Timestamp;
use sqlx::PgPool;
use uuid::Uuid;

/// Looks up and issues session tokens.
pub struct SessionRepo;

impl SessionRepo {
    /// Owner of an unexpired session, if any.
    pub async fn find_user(pool: &PgPool, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM sessions
             WHERE id = $1 AND (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Store a session token for a user.
    pub async fn create(
        pool: &PgPool,
        token: &str,
        user_id: Uuid,
        expires_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(pool)
            .await?;
        Ok(())
    }
}
