//! Route dispatch for inbound transport events

use super::events::{OutboundEvent, RelayOutcome, RelayStatus};
use super::session::RelaySession;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Route assigned to an inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Connect,
    Disconnect,
    SendMessage,
    Other(String),
}

impl Route {
    /// Parse a route key. Both `connect` and the broker-style `$connect` are accepted.
    pub fn parse(key: &str) -> Self {
        match key {
            "connect" | "$connect" => Route::Connect,
            "disconnect" | "$disconnect" => Route::Disconnect,
            "sendMessage" => Route::SendMessage,
            other => Route::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Connect => write!(f, "connect"),
            Route::Disconnect => write!(f, "disconnect"),
            Route::SendMessage => write!(f, "sendMessage"),
            Route::Other(key) => write!(f, "{}", key),
        }
    }
}

/// Event delivered by the connection broker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTransportEvent {
    pub route: String,
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RelaySession {
    /// Dispatch one transport event to the relay.
    ///
    /// - `connect` / `disconnect`: acknowledged, no events
    /// - `sendMessage`: [`RelaySession::handle`]
    /// - anything else: one `error` event `Unknown route <route>`, status 200
    pub async fn dispatch(&self, event: &InboundTransportEvent) -> RelayOutcome {
        let connection_id = event.connection_id.as_str();
        match Route::parse(&event.route) {
            Route::Connect => {
                debug!(connection_id = %connection_id, "Connection opened");
                RelayOutcome::ok()
            }
            Route::Disconnect => {
                debug!(connection_id = %connection_id, "Connection closed");
                RelayOutcome::ok()
            }
            Route::SendMessage => self.handle(connection_id, event.body.as_deref()).await,
            Route::Other(key) => {
                warn!(connection_id = %connection_id, route = %key, "Unknown route");
                let mut emitter = self.emitter(connection_id);
                emitter
                    .emit(OutboundEvent::error(format!("Unknown route {}", key)))
                    .await;
                RelayOutcome {
                    status: RelayStatus::Ok,
                    events: emitter.into_events(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{relay_with, RecordingGateway, ScriptedBackend};

    fn event(route: &str, body: Option<&str>) -> InboundTransportEvent {
        InboundTransportEvent {
            route: route.to_string(),
            connection_id: "conn-1".to_string(),
            body: body.map(String::from),
        }
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("$connect"), Route::Connect);
        assert_eq!(Route::parse("connect"), Route::Connect);
        assert_eq!(Route::parse("$disconnect"), Route::Disconnect);
        assert_eq!(Route::parse("sendMessage"), Route::SendMessage);
        assert_eq!(Route::parse("foo"), Route::Other("foo".into()));
        assert_eq!(Route::parse("foo").to_string(), "foo");
    }

    #[test]
    fn test_transport_event_json() {
        let json = r#"{"route":"sendMessage","connectionId":"abc","body":"{\"text\":\"hi\"}"}"#;
        let event: InboundTransportEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.connection_id, "abc");
        assert_eq!(event.body.as_deref(), Some(r#"{"text":"hi"}"#));

        let event: InboundTransportEvent =
            serde_json::from_str(r#"{"route":"connect","connectionId":"abc"}"#).unwrap();
        assert!(event.body.is_none());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (relay, backend, gateway) =
            relay_with(ScriptedBackend::fragments(&["x"]), RecordingGateway::new());

        let outcome = relay.dispatch(&event("foo", None)).await;

        assert_eq!(outcome.status, RelayStatus::Ok);
        assert_eq!(outcome.events, vec![OutboundEvent::error("Unknown route foo")]);
        assert_eq!(gateway.events_for("conn-1"), outcome.events);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_routes_are_acknowledged() {
        let (relay, backend, gateway) =
            relay_with(ScriptedBackend::fragments(&["x"]), RecordingGateway::new());

        for route in ["$connect", "$disconnect"] {
            let outcome = relay.dispatch(&event(route, None)).await;
            assert_eq!(outcome.status, RelayStatus::Ok);
            assert!(outcome.events.is_empty());
        }
        assert_eq!(gateway.attempts(), 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_message_route() {
        let (relay, backend, _gateway) =
            relay_with(ScriptedBackend::fragments(&["a"]), RecordingGateway::new());

        let outcome = relay
            .dispatch(&event("sendMessage", Some(r#"{"message":"hi"}"#)))
            .await;

        assert_eq!(outcome.status, RelayStatus::Ok);
        assert_eq!(
            outcome.events,
            vec![OutboundEvent::chunk("a"), OutboundEvent::Done]
        );
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_send_message_without_body() {
        let (relay, _backend, _gateway) =
            relay_with(ScriptedBackend::fragments(&["a"]), RecordingGateway::new());

        let outcome = relay.dispatch(&event("sendMessage", None)).await;
        assert_eq!(outcome.status, RelayStatus::BadRequest);
    }
}
