//! Domain types shared by every Archytex backend crate.
//!
//! - [`types`] -- typed entity identifiers and timestamps.
//! - [`account`] -- user profile and the asset catalog.
//! - [`project`] -- the `Project` / `Render` documents owned by a user.
//! - [`updates`] -- the read-only `Updates` projection streamed to clients.
//! - [`render_params`] -- render request parameters and their validation.
//! - [`timeout`] -- deadline wrapper for calls into external stores.

pub mod account;
pub mod error;
pub mod project;
pub mod render_params;
pub mod timeout;
pub mod types;
pub mod updates;
