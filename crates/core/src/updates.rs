//! Client-facing projection of a user's projects and renders.
//!
//! An [`Updates`] value is a complete, self-contained snapshot: it is
//! rebuilt from the document store on every feed tick and never persisted.
//! Field names and the optionality of `finished` are a wire contract with
//! existing clients.

use serde::{Deserialize, Serialize};

use crate::project::{Project, Render};
use crate::types::{ProjectId, RenderId, Timestamp};

/// One snapshot of everything a user owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    pub projects: Vec<ProjectUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    pub title: String,
    pub created: Timestamp,
    pub renders: Vec<RenderUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderUpdate {
    #[serde(rename = "_id")]
    pub id: RenderId,
    pub name: String,
    pub status: f64,
    pub started: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Timestamp>,
    pub icon: String,
}

impl Updates {
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        Self {
            projects: projects.into_iter().map(ProjectUpdate::from).collect(),
        }
    }

    pub fn project(&self, id: ProjectId) -> Option<&ProjectUpdate> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Total number of renders across all projects.
    pub fn render_count(&self) -> usize {
        self.projects.iter().map(|p| p.renders.len()).sum()
    }
}

impl From<&Project> for ProjectUpdate {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            created: project.created,
            renders: project.renders.iter().map(RenderUpdate::from).collect(),
        }
    }
}

impl From<&Render> for RenderUpdate {
    fn from(render: &Render) -> Self {
        Self {
            id: render.id,
            name: render.name.clone(),
            status: render.status,
            started: render.started,
            finished: render.finished,
            icon: render.icon.clone(),
        }
    }
}
