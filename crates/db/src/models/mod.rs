//! Row types mapped from PostgreSQL with `sqlx::FromRow`.

pub mod asset;
pub mod project;
pub mod render;
pub mod user;
