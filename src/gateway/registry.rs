//! Connection registry: live WebSocket connections addressable by id

use super::traits::ConnectionGateway;
use crate::relay::DeliveryError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Size of the per-connection outbound buffer
const CONNECTION_BUFFER_SIZE: usize = 64;

/// Lifecycle of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded, connect not yet acknowledged
    Opening,
    Open,
    /// Socket end observed, pushes are refused
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Opening => "opening",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

struct ConnectionHandle {
    sender: mpsc::Sender<String>,
    state: ConnectionState,
}

/// Registry of live connections.
///
/// Each registered connection owns an outbound channel; the socket's writer task
/// drains it. Pushing to an id that is unknown or no longer open fails with a
/// [`DeliveryError`].
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// Returns the issued connection id (a UUID v4, unchanged by session-key
    /// sanitization) and the receiver for its outbound payloads.
    pub fn register(&self) -> (String, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        let connection_id = Uuid::new_v4().to_string();
        self.connections.insert(
            connection_id.clone(),
            ConnectionHandle {
                sender: tx,
                state: ConnectionState::Opening,
            },
        );
        info!(connection_id = %connection_id, "Registered connection");
        (connection_id, rx)
    }

    pub fn mark_open(&self, connection_id: &str) {
        self.set_state(connection_id, ConnectionState::Open);
    }

    /// Refuse further pushes; the entry stays until [`Self::unregister`]
    pub fn mark_closing(&self, connection_id: &str) {
        self.set_state(connection_id, ConnectionState::Closing);
    }

    /// Remove a connection. Returns false if it was not registered.
    pub fn unregister(&self, connection_id: &str) -> bool {
        let removed = self.connections.remove(connection_id).is_some();
        if removed {
            info!(connection_id = %connection_id, "Unregistered connection");
        }
        removed
    }

    /// Current state, `Closed` once unregistered or never seen
    pub fn state(&self, connection_id: &str) -> ConnectionState {
        self.connections
            .get(connection_id)
            .map(|h| h.state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Number of registered connections
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    fn set_state(&self, connection_id: &str, state: ConnectionState) {
        if let Some(mut handle) = self.connections.get_mut(connection_id) {
            debug!(connection_id = %connection_id, from = %handle.state, to = %state, "Connection state");
            handle.state = state;
        }
    }
}

#[async_trait]
impl ConnectionGateway for ConnectionRegistry {
    async fn push(&self, connection_id: &str, payload: String) -> Result<(), DeliveryError> {
        // Clone the sender so no map guard is held across the send
        let sender = match self.connections.get(connection_id) {
            None => return Err(DeliveryError::Gone(connection_id.to_string())),
            Some(handle) => match handle.state {
                ConnectionState::Opening | ConnectionState::Open => handle.sender.clone(),
                ConnectionState::Closing | ConnectionState::Closed => {
                    return Err(DeliveryError::Closed(connection_id.to_string()))
                }
            },
        };

        sender
            .send(payload)
            .await
            .map_err(|_| DeliveryError::Closed(connection_id.to_string()))
    }
}
