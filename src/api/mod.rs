//! HTTP and WebSocket API for the relay

pub mod handlers;
pub mod routes;
pub mod ws_handler;

pub use routes::create_router;
