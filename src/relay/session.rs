//! Relay session: one inbound message in, one ordered event sequence out
//!
//! For each call to [`RelaySession::handle`]:
//! 1. parse the body and extract the user's text (400 on empty text)
//! 2. derive the session key from the connection id
//! 3. invoke the upstream backend exactly once
//! 4. push every non-empty fragment as a `chunk`, in upstream order
//! 5. finish with exactly one `done` or `error`
//!
//! Delivery failures are logged and swallowed: the remaining events are still
//! emitted and the status is unaffected.

use super::error::{RelayError, UpstreamError};
use super::events::{OutboundEvent, RelayOutcome, RelayStatus};
use super::key::{derive_key, is_usable_key};
use super::request::InboundRequest;
use crate::gateway::ConnectionGateway;
use crate::upstream::{InferenceBackend, InvocationRequest};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The relay core: stateless between calls, cheap to clone
#[derive(Clone)]
pub struct RelaySession {
    backend: Arc<dyn InferenceBackend>,
    gateway: Arc<dyn ConnectionGateway>,
}

impl RelaySession {
    pub fn new(backend: Arc<dyn InferenceBackend>, gateway: Arc<dyn ConnectionGateway>) -> Self {
        Self { backend, gateway }
    }

    /// Name of the upstream backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Relay one inbound message from `connection_id`.
    ///
    /// Never fails to the caller: every failure becomes a terminal `error` event
    /// plus a non-success status.
    pub async fn handle(&self, connection_id: &str, raw_body: Option<&str>) -> RelayOutcome {
        let mut emitter = self.emitter(connection_id);

        let status = match self.relay(connection_id, raw_body, &mut emitter).await {
            Ok(()) => {
                emitter.emit(OutboundEvent::Done).await;
                RelayStatus::Ok
            }
            Err(e) => {
                match &e {
                    RelayError::Validation => {
                        debug!(connection_id = %connection_id, "Rejected message without text")
                    }
                    _ => error!(connection_id = %connection_id, error = %e, "Relay failed"),
                }
                emitter.emit(OutboundEvent::error(e.client_message())).await;
                e.status()
            }
        };

        let outcome = RelayOutcome {
            status,
            events: emitter.into_events(),
        };
        info!(
            connection_id = %connection_id,
            status = status.code(),
            chunks = outcome.chunk_count(),
            "Relay finished"
        );
        outcome
    }

    /// Event emitter bound to one connection
    pub(super) fn emitter<'a>(&'a self, connection_id: &'a str) -> Emitter<'a> {
        Emitter::new(self.gateway.as_ref(), connection_id)
    }

    async fn relay(
        &self,
        connection_id: &str,
        raw_body: Option<&str>,
        emitter: &mut Emitter<'_>,
    ) -> Result<(), RelayError> {
        let request = InboundRequest::parse(raw_body)?;

        let session_key = derive_key(connection_id);
        if !is_usable_key(&session_key) {
            return Err(RelayError::InvalidSessionKey(connection_id.to_string()));
        }

        debug!(
            connection_id = %connection_id,
            session_key = %session_key,
            backend = %self.backend.name(),
            text_len = request.text.len(),
            "Invoking upstream agent"
        );

        let mut stream = self
            .backend
            .invoke(InvocationRequest {
                session_key,
                input_text: request.text,
            })
            .await?;

        // Returning early drops the stream, which stops consuming it
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.bytes.is_empty() {
                continue;
            }
            let text = String::from_utf8(fragment.bytes).map_err(UpstreamError::from)?;
            emitter.emit(OutboundEvent::Chunk { text }).await;
        }

        Ok(())
    }
}

/// Pushes events to one connection and records what was emitted
pub(super) struct Emitter<'a> {
    gateway: &'a dyn ConnectionGateway,
    connection_id: &'a str,
    events: Vec<OutboundEvent>,
}

impl<'a> Emitter<'a> {
    fn new(gateway: &'a dyn ConnectionGateway, connection_id: &'a str) -> Self {
        Self {
            gateway,
            connection_id,
            events: Vec::new(),
        }
    }

    pub(super) async fn emit(&mut self, event: OutboundEvent) {
        if let Err(e) = self
            .gateway
            .push(self.connection_id, event.to_payload())
            .await
        {
            warn!(
                connection_id = %self.connection_id,
                event = event.kind(),
                error = %e,
                "Failed to deliver event"
            );
        }
        self.events.push(event);
    }

    pub(super) fn into_events(self) -> Vec<OutboundEvent> {
        self.events
    }
}
