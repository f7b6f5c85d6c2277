//! Repository for the `assets` table.

use archytex_core::account::AssetKind;
use sqlx::PgPool;

use crate::models::asset::AssetRow;

/// Read access to the shared asset catalog.
pub struct AssetRepo;

impl AssetRepo {
    /// Every asset of `kind`, ordered by name.
    pub async fn list(pool: &PgPool, kind: AssetKind) -> Result<Vec<AssetRow>, sqlx::Error> {
        sqlx::query_as::<_, AssetRow>(
            "SELECT id, name FROM assets WHERE kind = $1 ORDER BY name ASC, id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(pool)
        .await
    }

    /// Add a catalog entry.
    pub async fn create(
        pool: &PgPool,
        kind: AssetKind,
        id: &str,
        name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO assets (id, kind, name) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(kind.as_str())
            .bind(name)
            .execute(pool)
            .await?;
        Ok(())
    }
}
