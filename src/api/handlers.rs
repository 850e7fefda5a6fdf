//! API request handlers

use crate::relay::{InboundTransportEvent, RelayStatus};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// Health check
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Name of the upstream backend in use
    pub upstream: String,
    /// Live WebSocket connections
    pub connections: usize,
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: state.relay.backend_name().to_string(),
        connections: state.registry.count(),
    })
}

// ============================================================================
// Broker-style relay events
// ============================================================================

/// Response of the relay events endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEventResponse {
    pub status_code: u16,
}

fn status_code(status: RelayStatus) -> StatusCode {
    match status {
        RelayStatus::Ok => StatusCode::OK,
        RelayStatus::BadRequest => StatusCode::BAD_REQUEST,
        RelayStatus::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Dispatch one transport event (`{route, connectionId, body?}`).
///
/// Events are pushed to the registry connection with that id; the HTTP response
/// carries only the relay status.
pub async fn relay_event(
    State(state): State<AppState>,
    payload: Result<Json<InboundTransportEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<RelayEventResponse>), AppError> {
    let Json(event) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    debug!(
        route = %event.route,
        connection_id = %event.connection_id,
        "Relay event received"
    );

    let outcome = state.relay.dispatch(&event).await;
    Ok((
        status_code(outcome.status),
        Json(RelayEventResponse {
            status_code: outcome.status.code(),
        }),
    ))
}

/// Fallback for unknown paths
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::relay::OutboundEvent;
    use crate::test_helpers::{canned_app_state, mock_app_state, registry_of, ScriptedBackend};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_event(json: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/relay/events")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(canned_app_state());

        let req = HttpRequest::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["upstream"], "canned");
        assert_eq!(json["connections"], 0);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_send_message_event_streams_to_connection() {
        let state = mock_app_state(Arc::new(ScriptedBackend::fragments(&["Hola", " amigo"])));
        let registry = registry_of(&state);
        let (connection_id, mut rx) = registry.register();
        registry.mark_open(&connection_id);
        let app = create_router(state);

        let resp = app
            .oneshot(post_event(serde_json::json!({
                "route": "sendMessage",
                "connectionId": connection_id,
                "body": r#"{"action":"sendMessage","message":"hola"}"#,
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, serde_json::json!({ "statusCode": 200 }));

        let mut events = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            events.push(serde_json::from_str::<OutboundEvent>(&payload).unwrap());
        }
        assert_eq!(
            events,
            vec![
                OutboundEvent::chunk("Hola"),
                OutboundEvent::chunk(" amigo"),
                OutboundEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_text_is_400() {
        let app = create_router(canned_app_state());

        let resp = app
            .oneshot(post_event(serde_json::json!({
                "route": "sendMessage",
                "connectionId": "gone",
                "body": "{}",
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["statusCode"], 400);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        let state = mock_app_state(Arc::new(ScriptedBackend::failing_invoke("down")));
        let app = create_router(state);

        let resp = app
            .oneshot(post_event(serde_json::json!({
                "route": "sendMessage",
                "connectionId": "conn-1",
                "body": r#"{"text":"hi"}"#,
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_route_is_200() {
        let app = create_router(canned_app_state());

        let resp = app
            .oneshot(post_event(serde_json::json!({
                "route": "foo",
                "connectionId": "conn-1",
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let app = create_router(canned_app_state());

        let req = HttpRequest::builder()
            .method("POST")
            .uri("/api/relay/events")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"route":"sendMessage"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = create_router(canned_app_state());

        let req = HttpRequest::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["error"], "Not found");
    }
}
