//! InferenceBackend trait definition
//!
//! Abstract interface for the upstream streaming agent call. Same shape as the
//! other swappable services in this crate: async trait + Send + Sync, shared as
//! `Arc<dyn InferenceBackend>`.

use crate::relay::UpstreamError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// One unit of partial output produced by the agent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    /// Raw payload bytes (UTF-8 text when non-empty)
    pub bytes: Vec<u8>,
}

impl Fragment {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

/// Lazy, finite, non-restartable sequence of fragments
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, UpstreamError>> + Send>>;

/// Parameters of one upstream invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Sanitized per-connection key scoping the agent's conversational context
    pub session_key: String,
    /// Trimmed user text
    pub input_text: String,
}

/// Abstract interface for invoking the conversational agent.
///
/// # Implementations
///
/// - [`HttpAgentBackend`](super::HttpAgentBackend): streams NDJSON completion
///   records from an agent endpoint
/// - [`CannedBackend`](super::CannedBackend): simulated replies when no real
///   agent is reachable
/// - [`ScriptedBackend`](super::ScriptedBackend): scripted fragments and failures
///   (for tests)
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Start one agent call.
    ///
    /// May suspend for the duration of the remote call before returning the
    /// fragment stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be started (network failure,
    /// non-success status, etc.)
    async fn invoke(&self, request: InvocationRequest) -> Result<FragmentStream, UpstreamError>;

    /// Backend name reported by the health endpoint
    fn name(&self) -> &str;
}
