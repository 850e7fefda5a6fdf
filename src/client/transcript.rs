//! Accumulates one streamed reply for display

use super::cleanup::clean_text;
use crate::relay::OutboundEvent;

/// Where the reply is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyState {
    Streaming,
    Complete,
    Failed(String),
}

/// One assistant reply built from `chunk` events.
///
/// Chunks are concatenated raw and cleaned as a whole, so markup split across
/// chunk boundaries is still removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    raw: String,
    state: ReplyState,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            raw: String::new(),
            state: ReplyState::Streaming,
        }
    }

    /// Apply one event. Returns true once the reply is finished.
    ///
    /// Events after the terminal one are ignored.
    pub fn apply(&mut self, event: &OutboundEvent) -> bool {
        if self.is_finished() {
            return true;
        }
        match event {
            OutboundEvent::Chunk { text } => self.raw.push_str(text),
            OutboundEvent::Done => self.state = ReplyState::Complete,
            OutboundEvent::Error { message } => self.state = ReplyState::Failed(message.clone()),
        }
        self.is_finished()
    }

    /// Concatenated chunk text as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Cleaned text for display
    pub fn display_text(&self) -> String {
        clean_text(&self.raw)
    }

    pub fn state(&self) -> &ReplyState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state != ReplyState::Streaming
    }

    /// Error message if the reply failed
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ReplyState::Failed(message) => Some(message),
            _ => None,
        }
    }
}
