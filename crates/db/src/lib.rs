//! Archytex document store.
//!
//! - [`store`] -- the [`DocumentStore`] and [`SessionGate`] traits every
//!   other crate depends on.
//! - [`pg`] -- PostgreSQL implementations backed by `sqlx`, with a
//!   `LISTEN/NOTIFY` change feed.
//! - [`memory`] -- in-process implementations for tests and local runs.

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use memory::{MemoryDocumentStore, MemorySessionGate};
pub use pg::{PgDocumentStore, PgSessionGate};
pub use store::{Change, ChangeStream, DocumentStore, SessionGate};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
