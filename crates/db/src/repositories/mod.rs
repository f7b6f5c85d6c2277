//! Repository layer: one zero-sized struct per table, with associated async
//! functions taking a pool or connection.

pub mod asset_repo;
pub mod project_repo;
pub mod render_repo;
pub mod session_repo;
pub mod user_repo;

pub use asset_repo::AssetRepo;
pub use project_repo::ProjectRepo;
pub use render_repo::RenderRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
