pub mod asset;
pub mod project;
pub mod render;
pub mod user;
