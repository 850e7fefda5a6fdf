//! Outbound event wire types and relay status

use serde::{Deserialize, Serialize};

/// Event pushed to a connection while relaying one request.
///
/// Wire format (JSON, tagged by `type`):
/// - `{"type":"chunk","text":"..."}`
/// - `{"type":"done"}`
/// - `{"type":"error","message":"..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// One decoded fragment of the agent's reply
    Chunk { text: String },
    /// Reply finished successfully
    Done,
    /// Request failed
    Error { message: String },
}

impl OutboundEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        OutboundEvent::Chunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            message: message.into(),
        }
    }

    /// `done` and `error` close out a request's event sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboundEvent::Done | OutboundEvent::Error { .. })
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::Chunk { .. } => "chunk",
            OutboundEvent::Done => "done",
            OutboundEvent::Error { .. } => "error",
        }
    }

    /// JSON payload pushed to the connection
    pub fn to_payload(&self) -> String {
        // Serializing a plain enum of strings cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }
}

/// Status returned by the relay entry point to its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Ok,
    BadRequest,
    Internal,
}

impl RelayStatus {
    pub fn code(self) -> u16 {
        match self {
            RelayStatus::Ok => 200,
            RelayStatus::BadRequest => 400,
            RelayStatus::Internal => 500,
        }
    }

    pub fn is_success(self) -> bool {
        self == RelayStatus::Ok
    }
}

/// Result of one relay invocation: the status plus every event emitted, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub status: RelayStatus,
    pub events: Vec<OutboundEvent>,
}

impl RelayOutcome {
    pub fn ok() -> Self {
        Self {
            status: RelayStatus::Ok,
            events: Vec::new(),
        }
    }

    /// Number of `chunk` events emitted
    pub fn chunk_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::Chunk { .. }))
            .count()
    }
}
