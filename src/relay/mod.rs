//! Relay core: turns one inbound chat message into an ordered event stream
//!
//! - `RelaySession`: validates, invokes the upstream agent once, pushes events
//! - `dispatch`: maps transport routes (connect / disconnect / sendMessage) onto the relay
//! - `derive_key`: per-connection session key for the upstream agent
//! - `OutboundEvent`: `chunk` / `done` / `error` wire payloads

mod dispatch;
mod error;
mod events;
mod key;
mod request;
mod session;

pub use dispatch::{InboundTransportEvent, Route};
pub use error::{
    DeliveryError, RelayError, UpstreamError, MISSING_TEXT_MESSAGE, UPSTREAM_FALLBACK_MESSAGE,
};
pub use events::{OutboundEvent, RelayOutcome, RelayStatus};
pub use key::{derive_key, is_usable_key};
pub use request::{extract_text, parse_payload, InboundRequest, TEXT_FIELDS};
pub use session::RelaySession;
