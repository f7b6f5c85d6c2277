//! User row model.

use archytex_core::account::UserProfile;
use sqlx::FromRow;

/// Profile columns of a row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserProfileRow {
    pub username: String,
    pub email: String,
    pub coins: f64,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
        Self {
            username: row.username,
            email: row.email,
            coins: row.coins,
        }
    }
}
