//! Asset row model.

use archytex_core::account::Asset;
use sqlx::FromRow;

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub id: String,
    pub name: String,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}
