//! Chat client for the relay
//!
//! - `ChatClient`: sends messages over WebSocket and collects replies
//! - `Transcript`: accumulates `chunk` events into one reply
//! - `clean_text`: strips agent markup before display

mod cleanup;
mod transcript;
mod ws_client;

pub use cleanup::{clean_text, CRISIS_RESOURCES};
pub use transcript::{ReplyState, Transcript};
pub use ws_client::{ChatClient, ClientError, CONNECT_TIMEOUT};
