//! Project and render documents.
//!
//! A [`Project`] is embedded in exactly one user's record and owns an ordered
//! list of [`Render`]s. Renders are created by the dispatcher, progressed by
//! the external render worker, and deleted by the owning user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{ProjectId, RenderId, Timestamp};

/// Longest accepted project title, in characters.
pub const MAX_TITLE_LEN: usize = 128;

/// A user's project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    pub title: String,
    pub created: Timestamp,
    pub renders: Vec<Render>,
    /// Private storage location of the scene file. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub path: String,
    #[serde(default)]
    pub assets: Vec<String>,
}

impl Project {
    /// Build a new, empty project with a freshly generated storage path.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            title: title.into(),
            created: chrono::Utc::now(),
            renders: Vec::new(),
            path: new_storage_path(),
            assets: Vec::new(),
        }
    }

    pub fn render(&self, id: RenderId) -> Option<&Render> {
        self.renders.iter().find(|r| r.id == id)
    }
}

/// A render queued against a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Render {
    #[serde(rename = "_id")]
    pub id: RenderId,
    pub name: String,
    /// Progress fraction in `[0, 1]`.
    pub status: f64,
    pub started: Timestamp,
    /// Present only once the render is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Timestamp>,
    /// Empty until the worker publishes a preview.
    pub icon: String,
}

impl Render {
    /// A just-dispatched render: status 0, not finished, no icon.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            id: RenderId::new(),
            name: name.into(),
            status: 0.0,
            started: chrono::Utc::now(),
            finished: None,
            icon: String::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// A worker-side mutation of a render's progress fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderProgress {
    pub status: f64,
    pub finished: Option<Timestamp>,
    pub icon: Option<String>,
}

impl RenderProgress {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.status) {
            return Err(CoreError::Validation(format!(
                "Render status must be within [0, 1] (got {})",
                self.status
            )));
        }
        Ok(())
    }

    /// Apply the mutation. An absent icon leaves the current one untouched.
    pub fn apply(&self, render: &mut Render) {
        render.status = self.status;
        render.finished = self.finished;
        if let Some(icon) = &self.icon {
            render.icon = icon.clone();
        }
    }
}

/// Display name of the `sequence`-th render of a project.
pub fn render_name(project_title: &str, sequence: i64) -> String {
    format!("{project_title}-{sequence}")
}

/// Validate a user-supplied project title.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Project title must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Project title must not exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

/// Generate an opaque private storage path for a new project's scene file.
pub fn new_storage_path() -> String {
    Uuid::new_v4().simple().to_string()
}
