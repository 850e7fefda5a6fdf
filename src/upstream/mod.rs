//! Upstream agent backends
//!
//! Provides the `InferenceBackend` trait with three implementations:
//! - `HttpAgentBackend`: streams completions from an HTTP agent runtime
//! - `CannedBackend`: simulated replies when no agent is configured
//! - `ScriptedBackend`: scripted fragments and failures for tests

mod agent;
mod canned;
pub mod mock;
pub mod traits;

pub use agent::{AgentSettings, HttpAgentBackend, DEFAULT_AGENT_ALIAS_ID};
pub use canned::{word_fragments, CannedBackend, CANNED_REPLIES, DEFAULT_CANNED_DELAY};
pub use mock::{ScriptStep, ScriptedBackend};
pub use traits::{Fragment, FragmentStream, InferenceBackend, InvocationRequest};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Which backend the relay talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Always the HTTP agent; fails at startup if it is not configured
    Agent,
    /// Always the simulated agent
    Canned,
    /// The HTTP agent when configured, the simulated agent otherwise
    #[default]
    Auto,
}

impl FromStr for UpstreamMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "canned" => Ok(Self::Canned),
            "auto" => Ok(Self::Auto),
            other => anyhow::bail!("Unknown upstream mode '{}' (expected agent, canned or auto)", other),
        }
    }
}

fn agent_configured(settings: &AgentSettings) -> bool {
    !settings.endpoint.trim().is_empty() && !settings.agent_id.trim().is_empty()
}

/// Build the backend selected by `mode`
pub fn build_backend(
    mode: UpstreamMode,
    settings: &AgentSettings,
    canned_delay: Duration,
) -> anyhow::Result<Arc<dyn InferenceBackend>> {
    let use_agent = match mode {
        UpstreamMode::Agent => {
            if !agent_configured(settings) {
                anyhow::bail!("Upstream mode 'agent' requires an agent endpoint and agent id");
            }
            true
        }
        UpstreamMode::Canned => false,
        UpstreamMode::Auto => agent_configured(settings),
    };

    if use_agent {
        info!(
            endpoint = %settings.endpoint,
            agent_id = %settings.agent_id,
            alias_id = %settings.agent_alias_id,
            "Using HTTP agent backend"
        );
        Ok(Arc::new(HttpAgentBackend::new(settings.clone())?))
    } else {
        info!(delay_ms = canned_delay.as_millis() as u64, "Using canned backend");
        Ok(Arc::new(CannedBackend::with_delay(canned_delay)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str, agent_id: &str) -> AgentSettings {
        AgentSettings {
            endpoint: endpoint.into(),
            agent_id: agent_id.into(),
            agent_alias_id: DEFAULT_AGENT_ALIAS_ID.into(),
            region: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("agent".parse::<UpstreamMode>().unwrap(), UpstreamMode::Agent);
        assert_eq!(" Canned ".parse::<UpstreamMode>().unwrap(), UpstreamMode::Canned);
        assert_eq!("AUTO".parse::<UpstreamMode>().unwrap(), UpstreamMode::Auto);
        assert!("bedrock".parse::<UpstreamMode>().is_err());
    }

    #[test]
    fn test_auto_selection() {
        let backend = build_backend(
            UpstreamMode::Auto,
            &settings("http://localhost:9000", "A1"),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(backend.name(), "agent");

        let backend =
            build_backend(UpstreamMode::Auto, &settings("", "A1"), Duration::ZERO).unwrap();
        assert_eq!(backend.name(), "canned");

        let backend = build_backend(
            UpstreamMode::Auto,
            &settings("http://localhost:9000", " "),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(backend.name(), "canned");
    }

    #[test]
    fn test_explicit_modes() {
        let configured = settings("http://localhost:9000", "A1");
        let backend = build_backend(UpstreamMode::Canned, &configured, Duration::ZERO).unwrap();
        assert_eq!(backend.name(), "canned");

        assert!(build_backend(UpstreamMode::Agent, &settings("", ""), Duration::ZERO).is_err());
    }
}
