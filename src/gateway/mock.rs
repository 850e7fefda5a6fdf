//! Recording gateway for tests

use super::traits::ConnectionGateway;
use crate::relay::{DeliveryError, OutboundEvent};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Recorded {
    attempts: usize,
    delivered: Vec<(String, String)>,
}

/// Gateway that records delivered payloads and can be told to fail pushes.
///
/// Failures are selected by push index (0-based, counting every attempt).
#[derive(Debug, Default)]
pub struct RecordingGateway {
    fail_indices: HashSet<usize>,
    fail_all: bool,
    recorded: Mutex<Recorded>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the pushes at these indices with `DeliveryError::Gone`
    pub fn fail_pushes(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_indices.extend(indices);
        self
    }

    /// Fail every push, as if the connection were gone
    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Raw payloads delivered to `connection_id`, in order
    pub fn payloads_for(&self, connection_id: &str) -> Vec<String> {
        self.lock()
            .delivered
            .iter()
            .filter(|(id, _)| id == connection_id)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Events delivered to `connection_id`, in order
    pub fn events_for(&self, connection_id: &str) -> Vec<OutboundEvent> {
        self.payloads_for(connection_id)
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }

    /// Number of push attempts, failed ones included
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConnectionGateway for RecordingGateway {
    async fn push(&self, connection_id: &str, payload: String) -> Result<(), DeliveryError> {
        let mut recorded = self.lock();
        let index = recorded.attempts;
        recorded.attempts += 1;

        if self.fail_all || self.fail_indices.contains(&index) {
            return Err(DeliveryError::Gone(connection_id.to_string()));
        }
        recorded
            .delivered
            .push((connection_id.to_string(), payload));
        Ok(())
    }
}
