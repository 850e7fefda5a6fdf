//! Connection gateway: pushes outbound events to live connections
//!
//! - `ConnectionGateway`: the push seam used by the relay
//! - `ConnectionRegistry`: in-process registry backing the WebSocket endpoint
//! - `RecordingGateway`: records pushes for tests

pub mod mock;
mod registry;
pub mod traits;

pub use mock::RecordingGateway;
pub use registry::{ConnectionRegistry, ConnectionState};
pub use traits::ConnectionGateway;
