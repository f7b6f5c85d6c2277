//! Project row model.

use archytex_core::project::{Project, Render};
use archytex_core::types::{ProjectId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created: Timestamp,
    pub path: String,
    pub assets: Vec<String>,
    pub render_seq: i64,
}

impl ProjectRow {
    /// Assemble the domain document from this row and its ordered renders.
    pub fn into_project(self, renders: Vec<Render>) -> Project {
        Project {
            id: ProjectId::from_uuid(self.id),
            title: self.title,
            created: self.created,
            renders,
            path: self.path,
            assets: self.assets,
        }
    }
}

/// The client-visible subset of a project row.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectHeadRow {
    pub id: Uuid,
    pub title: String,
    pub created: Timestamp,
}
