use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Declare a UUID-backed identifier newtype for one entity kind.
///
/// Each id serializes as its hyphenated UUID string and can only be built
/// from external input through [`FromStr`], which rejects malformed values
/// with [`CoreError::Validation`].
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Entity name used in error messages.
            pub const ENTITY: &'static str = $entity;

            /// Generate a fresh time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| CoreError::Validation(format!("invalid {} id: '{}'", $entity, s)))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Identity of a user account (the owner of a project collection).
    UserId,
    "user"
);

entity_id!(
    /// Identity of a project embedded in a user's collection.
    ProjectId,
    "project"
);

entity_id!(
    /// Identity of a render queued against a project.
    RenderId,
    "render"
);
