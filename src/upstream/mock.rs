//! Scripted backend for tests
//!
//! Plays back a fixed list of steps (fragments or failures) on every invocation
//! and records each request it receives.

use super::traits::{Fragment, FragmentStream, InferenceBackend, InvocationRequest};
use crate::relay::UpstreamError;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One step of a scripted upstream stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Yield a fragment with these bytes
    Fragment(Vec<u8>),
    /// Yield an in-stream failure with this message
    Fail(String),
}

/// Deterministic backend that replays a script.
///
/// # Example
///
/// ```rust
/// use agent_relay::upstream::{InferenceBackend, InvocationRequest, ScriptedBackend};
/// use futures::StreamExt;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let backend = ScriptedBackend::fragments(&["Hola", " amigo"]);
/// let stream = backend
///     .invoke(InvocationRequest {
///         session_key: "conn-1".into(),
///         input_text: "hi".into(),
///     })
///     .await
///     .unwrap();
/// let fragments: Vec<_> = stream.collect().await;
/// assert_eq!(fragments.len(), 2);
/// assert_eq!(backend.call_count(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    steps: Vec<ScriptStep>,
    invoke_error: Option<String>,
    step_delay: Option<Duration>,
    calls: Mutex<Vec<InvocationRequest>>,
    consumed: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// Script that yields each text as one fragment, then ends normally
    pub fn fragments(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| ScriptStep::Fragment(t.as_bytes().to_vec()))
                .collect(),
        )
    }

    /// Backend whose invocation itself fails
    pub fn failing_invoke(message: impl Into<String>) -> Self {
        Self {
            invoke_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Sleep before yielding each step
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<InvocationRequest> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Total steps pulled from all streams handed out
    pub fn steps_consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn invoke(&self, request: InvocationRequest) -> Result<FragmentStream, UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        if let Some(message) = &self.invoke_error {
            return Err(UpstreamError::Agent(message.clone()));
        }

        let consumed = self.consumed.clone();
        let delay = self.step_delay;
        let stream = futures::stream::iter(self.steps.clone()).then(move |step| {
            let consumed = consumed.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                consumed.fetch_add(1, Ordering::SeqCst);
                match step {
                    ScriptStep::Fragment(bytes) => Ok(Fragment::new(bytes)),
                    ScriptStep::Fail(message) => Err(UpstreamError::Agent(message)),
                }
            }
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
