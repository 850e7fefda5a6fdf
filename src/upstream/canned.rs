//! Canned backend: simulated replies when no real agent is reachable
//!
//! Streams one of a fixed set of supportive replies, split on word boundaries so
//! the client sees the same incremental `chunk` flow as with a live agent.

use super::traits::{Fragment, FragmentStream, InferenceBackend, InvocationRequest};
use crate::relay::UpstreamError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default replies of the simulated agent
pub const CANNED_REPLIES: [&str; 4] = [
    "¡Hola! Soy Bunny Buddy 🐰. Estoy aquí para escucharte y apoyarte. ¿Cómo te sientes hoy?",
    "Entiendo cómo te sientes. Es completamente normal tener esos sentimientos. ¿Te gustaría contarme más?",
    "Eres muy valiente por compartir esto conmigo. Recuerda que siempre hay esperanza y que no estás solo/a.",
    "Me alegra que confíes en mí. Juntos podemos encontrar maneras de hacer que te sientas mejor. 💙",
];

/// Default simulated thinking time before the reply starts
pub const DEFAULT_CANNED_DELAY: Duration = Duration::from_millis(1500);

/// Simulated agent that rotates through canned replies
#[derive(Debug)]
pub struct CannedBackend {
    replies: Vec<String>,
    delay: Duration,
    next: AtomicUsize,
}

impl CannedBackend {
    pub fn new(replies: Vec<String>, delay: Duration) -> Self {
        Self {
            replies,
            delay,
            next: AtomicUsize::new(0),
        }
    }

    /// Built-in replies with the given delay
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(CANNED_REPLIES.iter().map(|r| r.to_string()).collect(), delay)
    }

    fn next_reply(&self) -> Option<&str> {
        if self.replies.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        Some(self.replies[index].as_str())
    }
}

impl Default for CannedBackend {
    fn default() -> Self {
        Self::with_delay(DEFAULT_CANNED_DELAY)
    }
}

/// Split text into word fragments that concatenate back to the original
pub fn word_fragments(text: &str) -> Vec<Fragment> {
    text.split_inclusive(' ').map(Fragment::text).collect()
}

#[async_trait]
impl InferenceBackend for CannedBackend {
    async fn invoke(&self, request: InvocationRequest) -> Result<FragmentStream, UpstreamError> {
        let reply = self
            .next_reply()
            .ok_or_else(|| UpstreamError::Agent("No canned replies configured".to_string()))?
            .to_string();

        debug!(
            session_key = %request.session_key,
            delay_ms = self.delay.as_millis() as u64,
            "Simulating agent reply"
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fragments = word_fragments(&reply).into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(fragments)))
    }

    fn name(&self) -> &str {
        "canned"
    }
}
