//! Error taxonomy for the relay path
//!
//! - `RelayError`: why a single `handle` call failed (mapped to a status code)
//! - `UpstreamError`: the inference call or its stream failed
//! - `DeliveryError`: a push to a connection failed (swallowed by the relay)

use super::events::RelayStatus;
use thiserror::Error;

/// Message sent to the client when the request carries no usable text
pub const MISSING_TEXT_MESSAGE: &str = "Missing 'message' or 'text'.";

/// Fallback message when an upstream failure carries no text of its own
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "InvokeAgent failed";

/// Failure of one relay invocation
#[derive(Debug, Error)]
pub enum RelayError {
    /// Extracted text was empty or missing (client's fault)
    #[error("{}", MISSING_TEXT_MESSAGE)]
    Validation,

    /// Connection id contained no allow-listed characters
    #[error("Connection id {0:?} has no usable session key characters")]
    InvalidSessionKey(String),

    /// Upstream inference call or its stream failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    /// Status reported to the transport for this failure
    pub fn status(&self) -> RelayStatus {
        match self {
            RelayError::Validation => RelayStatus::BadRequest,
            RelayError::InvalidSessionKey(_) | RelayError::Upstream(_) => RelayStatus::Internal,
        }
    }

    /// Human-readable message carried by the terminal `error` event
    pub fn client_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            UPSTREAM_FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Failure of the upstream inference call or of its fragment stream
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure talking to the agent endpoint
    #[error("Agent request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Agent endpoint answered with a non-success status
    #[error("Agent returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A completion record could not be understood
    #[error("Malformed agent stream: {0}")]
    Protocol(String),

    /// Fragment payload was not valid UTF-8
    #[error("Failed to decode agent chunk: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// The agent itself reported a failure in-stream
    #[error("{0}")]
    Agent(String),
}

/// Failure to push an event to a connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No connection with this id is registered
    #[error("Connection {0} is gone")]
    Gone(String),

    /// The connection exists but no longer accepts events
    #[error("Connection {0} is closed")]
    Closed(String),
}
