//! End-to-end tests: a live relay server driven over WebSocket

use agent_relay::api::create_router;
use agent_relay::client::{ChatClient, ClientError, ReplyState};
use agent_relay::relay::OutboundEvent;
use agent_relay::upstream::{ScriptStep, ScriptedBackend};
use agent_relay::{AppState, Config};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Start a relay on an ephemeral port, returning its base address and state
async fn spawn_relay(backend: ScriptedBackend) -> (String, AppState) {
    let state = AppState::with_backend(Config::default(), Arc::new(backend));
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("127.0.0.1:{}", addr.port()), state)
}

async fn next_event(
    socket: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> OutboundEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("event within 5s")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_chat_client_receives_chunks_then_done() {
    let (addr, _state) = spawn_relay(ScriptedBackend::fragments(&[
        "Bot: <answer>Hola",
        ", ¿cómo",
        " estás?</answer>",
    ]))
    .await;

    let mut client = ChatClient::connect(&format!("ws://{}/ws", addr))
        .await
        .unwrap();

    let mut seen = Vec::new();
    let transcript = client
        .send("me siento solo", |event| seen.push(event.clone()))
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![
            OutboundEvent::chunk("Bot: <answer>Hola"),
            OutboundEvent::chunk(", ¿cómo"),
            OutboundEvent::chunk(" estás?</answer>"),
            OutboundEvent::Done,
        ]
    );
    assert_eq!(transcript.state(), &ReplyState::Complete);
    assert_eq!(transcript.display_text(), "Hola, ¿cómo estás?");

    // Same connection serves a second message
    let transcript = client.send("gracias", |_| {}).await.unwrap();
    assert_eq!(transcript.state(), &ReplyState::Complete);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_upstream_failure_reaches_client() {
    let (addr, _state) = spawn_relay(ScriptedBackend::new(vec![
        ScriptStep::Fragment(b"partial".to_vec()),
        ScriptStep::Fail("throttled".into()),
    ]))
    .await;

    let mut client = ChatClient::connect(&format!("ws://{}/ws", addr))
        .await
        .unwrap();
    let transcript = client.send("hola", |_| {}).await.unwrap();

    assert_eq!(transcript.raw(), "partial");
    assert_eq!(transcript.error(), Some("throttled"));
}

#[tokio::test]
async fn test_empty_message_is_rejected_locally() {
    let (addr, _state) = spawn_relay(ScriptedBackend::fragments(&["x"])).await;

    let mut client = ChatClient::connect(&format!("ws://{}/ws", addr))
        .await
        .unwrap();
    assert!(matches!(
        client.send("   ", |_| {}).await,
        Err(ClientError::EmptyMessage)
    ));
}

#[tokio::test]
async fn test_raw_frames_routing() {
    let (addr, _state) = spawn_relay(ScriptedBackend::fragments(&["ok"])).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    // Unknown action
    socket
        .send(Message::Text(r#"{"action":"foo"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut socket).await,
        OutboundEvent::error("Unknown route foo")
    );

    // No action at all
    socket
        .send(Message::Text(r#"{"message":"hi"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut socket).await,
        OutboundEvent::error("Unknown route $default")
    );

    // Missing text
    socket
        .send(Message::Text(r#"{"action":"sendMessage"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut socket).await,
        OutboundEvent::error("Missing 'message' or 'text'.")
    );

    // `text` works as well as `message`
    socket
        .send(Message::Text(r#"{"action":"sendMessage","text":"hi"}"#.into()))
        .await
        .unwrap();
    assert_eq!(next_event(&mut socket).await, OutboundEvent::chunk("ok"));
    assert_eq!(next_event(&mut socket).await, OutboundEvent::Done);
}

#[tokio::test]
async fn test_messages_on_one_connection_do_not_interleave() {
    let backend =
        ScriptedBackend::fragments(&["a", "b", "c"]).with_step_delay(Duration::from_millis(10));
    let (addr, _state) = spawn_relay(backend).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    for _ in 0..2 {
        socket
            .send(Message::Text(
                r#"{"action":"sendMessage","message":"hi"}"#.into(),
            ))
            .await
            .unwrap();
    }

    let mut events = Vec::new();
    for _ in 0..8 {
        events.push(next_event(&mut socket).await);
    }
    let one_reply = vec![
        OutboundEvent::chunk("a"),
        OutboundEvent::chunk("b"),
        OutboundEvent::chunk("c"),
        OutboundEvent::Done,
    ];
    assert_eq!(events[..4], one_reply[..]);
    assert_eq!(events[4..], one_reply[..]);
}

#[tokio::test]
async fn test_connection_count_follows_sockets() {
    let (addr, state) = spawn_relay(ScriptedBackend::fragments(&["x"])).await;
    let health_url = format!("http://{}/health", addr);

    let client = ChatClient::connect(&format!("ws://{}/ws", addr))
        .await
        .unwrap();
    wait_for_count(&state, 1).await;

    let health: serde_json::Value = reqwest::get(&health_url)
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["upstream"], "scripted");
    assert_eq!(health["connections"], 1);

    client.close().await.unwrap();

    // Unregistration happens after the server sees the close
    wait_for_count(&state, 0).await;
}

/// Registration runs in the upgrade callback, after the client handshake returns
async fn wait_for_count(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.registry.count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.registry.count(), expected);
}
