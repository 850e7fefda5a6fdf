//! ConnectionGateway trait definition

use crate::relay::DeliveryError;
use async_trait::async_trait;

/// Outbound side of the connection broker: push one payload to one connection.
///
/// Implementations serialize pushes internally; callers may push many times in
/// quick succession for the same connection without their own locking.
#[async_trait]
pub trait ConnectionGateway: Send + Sync {
    /// Deliver a JSON payload to a connection.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the connection no longer exists or no
    /// longer accepts events.
    async fn push(&self, connection_id: &str, payload: String) -> Result<(), DeliveryError>;
}
