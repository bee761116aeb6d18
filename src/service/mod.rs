//! Board-session server: live boards over REST with WebSocket updates.

pub mod api;
pub mod server;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AppState, SharedState, api_router};
pub use server::{ServerConfig, build_router, start_server};
pub use ws::{WsMessage, broadcast_message};
