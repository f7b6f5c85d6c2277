//! Repository for the `users` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::UserProfileRow;

/// Minimal user bookkeeping; registration lives outside this backend.
pub struct UserRepo;

impl UserRepo {
    pub async fn create(
        pool: &PgPool,
        id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO users (id, username, email) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(username)
            .bind(email)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Profile columns of a user, if the account exists.
    pub async fn find_profile(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<UserProfileRow>, sqlx::Error> {
        sqlx::query_as::<_, UserProfileRow>("SELECT username, email, coins FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
