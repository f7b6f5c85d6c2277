//! WebSocket infrastructure for live project updates.
//!
//! Provides the connection registry, heartbeat pings, and the HTTP upgrade
//! handlers used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{
    auth_ws_handler, encode_updates, parse_session_frame, updates_sink, ws_handler, WsSendError,
};
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
