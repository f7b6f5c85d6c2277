//! The signed-in user's profile and the shared asset catalog.
//!
//! Projects reference catalog entries by id in [`Project::assets`].
//!
//! [`Project::assets`]: crate::project::Project::assets

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public profile of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    /// Render credit balance.
    pub coins: f64,
}

/// Catalog section an [`Asset`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Prop,
    Texture,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prop => "prop",
            Self::Texture => "texture",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the asset catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// The full catalog as served to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCatalog {
    pub props: Vec<Asset>,
    pub textures: Vec<Asset>,
}
