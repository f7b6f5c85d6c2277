//! Request extractors shared by authenticated routes.
//!
//! - [`auth::AuthUser`] -- resolves the session token in the `Authorization`
//!   header to a user.

pub mod auth;
