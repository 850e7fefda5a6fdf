//! HTTP agent backend
//!
//! Invokes a conversational agent over HTTP and streams its completion back as
//! newline-delimited JSON records.
//!
//! Request:
//! `POST {endpoint}/agents/{agent_id}/agentAliases/{alias_id}/sessions/{session_key}/text`
//! with `{"inputText": .., "enableTrace": false}`.
//!
//! Response body, one record per line:
//! - `{"chunk":{"bytes":"<base64>"}}`: one fragment of the reply
//! - `{"error":{"message":".."}}`: the agent failed mid-stream
//! - anything else (e.g. `{"trace":{..}}`) is ignored

use super::traits::{Fragment, FragmentStream, InferenceBackend, InvocationRequest};
use crate::relay::{is_usable_key, UpstreamError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Default agent alias
pub const DEFAULT_AGENT_ALIAS_ID: &str = "NDFYNKYUAQ";

/// Longest completion record accepted before the stream is abandoned
const MAX_RECORD_LEN: usize = 1024 * 1024;

/// Connection settings for [`HttpAgentBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Base URL of the agent runtime
    pub endpoint: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    /// Forwarded as `x-agent-region` when set
    pub region: Option<String>,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    /// Whole-request timeout, stream included
    pub timeout: Duration,
}

/// Streaming agent client over HTTP.
///
/// Thread-safe and cheaply cloneable (shares the reqwest client internally).
#[derive(Clone)]
pub struct HttpAgentBackend {
    client: reqwest::Client,
    settings: AgentSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeAgentBody<'a> {
    input_text: &'a str,
    enable_trace: bool,
}

/// One NDJSON record of the completion stream
#[derive(Debug, Deserialize)]
struct CompletionRecord {
    chunk: Option<ChunkPart>,
    error: Option<ErrorPart>,
}

#[derive(Debug, Deserialize)]
struct ChunkPart {
    bytes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPart {
    message: Option<String>,
}

/// Error body of a non-success response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
    error: Option<ErrorPart>,
}

impl HttpAgentBackend {
    pub fn new(settings: AgentSettings) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    fn invoke_url(&self, session_key: &str) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.agent_id,
            self.settings.agent_alias_id,
            session_key
        )
    }
}

#[async_trait]
impl InferenceBackend for HttpAgentBackend {
    async fn invoke(&self, request: InvocationRequest) -> Result<FragmentStream, UpstreamError> {
        if !is_usable_key(&request.session_key) {
            return Err(UpstreamError::Protocol(format!(
                "Session key {:?} cannot form a session path",
                request.session_key
            )));
        }
        let url = self.invoke_url(&request.session_key);
        debug!(url = %url, "Invoking agent");

        let mut req = self.client.post(&url).json(&InvokeAgentBody {
            input_text: &request.input_text,
            enable_trace: false,
        });
        if let Some(ref key) = self.settings.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref region) = self.settings.region {
            req = req.header("x-agent-region", region);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(completion_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "agent"
    }
}

/// Best-effort message from a non-success response body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorResponse {
            error: Some(ErrorPart {
                message: Some(message),
            }),
            ..
        }) => message,
        _ => body.trim().to_string(),
    }
}

/// Decode one completion line. `Ok(None)` for lines that carry no fragment.
fn parse_record(line: &[u8]) -> Result<Option<Fragment>, UpstreamError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let record: CompletionRecord = serde_json::from_slice(line)
        .map_err(|e| UpstreamError::Protocol(format!("Invalid completion record: {}", e)))?;

    if let Some(error) = record.error {
        return Err(UpstreamError::Agent(error.message.unwrap_or_default()));
    }

    match record.chunk.and_then(|c| c.bytes) {
        Some(encoded) => {
            let bytes = STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| UpstreamError::Protocol(format!("Invalid chunk encoding: {}", e)))?;
            Ok(Some(Fragment::new(bytes)))
        }
        None => Ok(None),
    }
}

struct LineReader<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    max_record_len: usize,
    finished: bool,
}

impl<S> LineReader<S> {
    /// Next complete line, or `Ok(None)` until more bytes arrive.
    ///
    /// Fails once a record, complete or still pending, is longer than the limit.
    fn next_line(&mut self) -> Result<Option<Vec<u8>>, UpstreamError> {
        let pending = match self.buffer.iter().position(|b| *b == b'\n') {
            Some(end) if end <= self.max_record_len => {
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                return Ok(Some(line));
            }
            Some(end) => end,
            None if self.buffer.len() > self.max_record_len => self.buffer.len(),
            None => return Ok(None),
        };
        Err(UpstreamError::Protocol(format!(
            "Completion record exceeds {} bytes (got {})",
            self.max_record_len, pending
        )))
    }

    fn stop(&mut self) {
        self.finished = true;
        self.buffer.clear();
    }
}

/// Turn a raw NDJSON byte stream into fragments.
///
/// Records may be split across network chunks. The stream ends after the first
/// error, including a record that grows past the length limit.
pub(crate) fn completion_stream<S, B>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    completion_stream_with_limit(bytes, MAX_RECORD_LEN)
}

fn completion_stream_with_limit<S, B>(bytes: S, max_record_len: usize) -> FragmentStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let reader = LineReader {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        max_record_len,
        finished: false,
    };

    let stream = futures::stream::unfold(reader, |mut reader| async move {
        loop {
            match reader.next_line() {
                Ok(Some(line)) => match parse_record(&line) {
                    Ok(Some(fragment)) => return Some((Ok(fragment), reader)),
                    Ok(None) => continue,
                    Err(e) => {
                        reader.stop();
                        return Some((Err(e), reader));
                    }
                },
                Ok(None) if reader.finished => return None,
                Ok(None) => {}
                Err(e) => {
                    reader.stop();
                    return Some((Err(e), reader));
                }
            }
            match reader.inner.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.stop();
                    return Some((Err(e.into()), reader));
                }
                None => {
                    // Flush a trailing record without a newline
                    reader.finished = true;
                    if !reader.buffer.is_empty() {
                        reader.buffer.push(b'\n');
                    }
                }
            }
        }
    });

    Box::pin(stream)
}
