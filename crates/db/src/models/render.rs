//! Render row model.

use archytex_core::project::Render;
use archytex_core::types::{RenderId, Timestamp};
use archytex_core::updates::RenderUpdate;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `renders` table.
#[derive(Debug, Clone, FromRow)]
pub struct RenderRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub status: f64,
    pub started: Timestamp,
    pub finished: Option<Timestamp>,
    pub icon: String,
}

impl From<RenderRow> for Render {
    fn from(row: RenderRow) -> Self {
        Self {
            id: RenderId::from_uuid(row.id),
            name: row.name,
            status: row.status,
            started: row.started,
            finished: row.finished,
            icon: row.icon,
        }
    }
}

impl From<RenderRow> for RenderUpdate {
    fn from(row: RenderRow) -> Self {
        Self {
            id: RenderId::from_uuid(row.id),
            name: row.name,
            status: row.status,
            started: row.started,
            finished: row.finished,
            icon: row.icon,
        }
    }
}
