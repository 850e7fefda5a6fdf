//! WebSocket chat client for the relay

use super::transcript::Transcript;
use crate::relay::OutboundEvent;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Give up on a relay that does not complete the handshake in time
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Connection closed before the reply finished")]
    Closed,
    #[error("Message is empty")]
    EmptyMessage,
}

/// Frame sent for one user message
#[derive(Debug, Serialize)]
struct SendMessageFrame<'a> {
    action: &'static str,
    message: &'a str,
    timestamp: String,
}

/// Chat session over one relay connection
pub struct ChatClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChatClient {
    /// Connect to a relay WebSocket endpoint (`ws://host:port/ws`)
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| ClientError::ConnectTimeout(url.to_string()))??;
        info!(url = %url, "Connected to relay");
        Ok(Self { socket })
    }

    /// Send one message and read events until its reply finishes.
    ///
    /// `on_event` sees every event of this reply as it arrives, terminal
    /// event included. Unparseable frames are skipped.
    pub async fn send<F>(&mut self, text: &str, mut on_event: F) -> Result<Transcript, ClientError>
    where
        F: FnMut(&OutboundEvent),
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let frame = SendMessageFrame {
            action: "sendMessage",
            message: text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let frame = serde_json::to_string(&frame).unwrap_or_default();
        self.socket.send(Message::Text(frame.into())).await?;

        let mut transcript = Transcript::new();
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(payload) => {
                    let event = match serde_json::from_str::<OutboundEvent>(payload.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!(error = %e, "Skipping unrecognized frame");
                            continue;
                        }
                    };
                    on_event(&event);
                    if transcript.apply(&event) {
                        return Ok(transcript);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(ClientError::Closed)
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
