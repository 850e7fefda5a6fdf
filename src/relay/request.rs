//! Inbound request parsing and text extraction

use super::error::RelayError;
use serde_json::{Map, Value};

/// Field names consulted for the user's text, in precedence order
pub const TEXT_FIELDS: [&str; 2] = ["message", "text"];

/// A validated inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Trimmed, non-empty text to send upstream
    pub text: String,
}

impl InboundRequest {
    /// Parse a raw body and extract its text.
    ///
    /// Parsing never fails; only an empty extracted text is rejected.
    pub fn parse(raw_body: Option<&str>) -> Result<Self, RelayError> {
        let payload = parse_payload(raw_body);
        let text = extract_text(&payload).ok_or(RelayError::Validation)?;
        Ok(Self { text })
    }
}

/// Decode a raw body as a JSON object; anything else yields an empty payload.
pub fn parse_payload(raw_body: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw_body else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::debug!("Request body is JSON but not an object, treating as empty");
            Map::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Request body is not valid JSON, treating as empty");
            Map::new()
        }
    }
}

/// First field from [`TEXT_FIELDS`] whose value trims to a non-empty string.
pub fn extract_text(payload: &Map<String, Value>) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field).and_then(scalar_to_string))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
