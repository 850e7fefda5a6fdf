//! Agent Relay
//!
//! A streaming chat relay between WebSocket clients and a conversational agent:
//! - Accepts chat messages over WebSocket (or broker-style HTTP events)
//! - Invokes the upstream agent once per message
//! - Streams the reply back as ordered `chunk` events closed by `done` or `error`
//! - Ships a terminal chat client that renders the cleaned transcript

pub mod api;
pub mod client;
pub mod gateway;
pub mod relay;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use gateway::ConnectionRegistry;
use relay::RelaySession;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use upstream::{AgentSettings, InferenceBackend, UpstreamMode, DEFAULT_AGENT_ALIAS_ID};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub upstream: UpstreamYamlConfig,
    pub canned: CannedYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Upstream agent section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamYamlConfig {
    pub mode: UpstreamMode,
    pub endpoint: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub region: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for UpstreamYamlConfig {
    fn default() -> Self {
        Self {
            mode: UpstreamMode::Auto,
            endpoint: String::new(),
            agent_id: String::new(),
            agent_alias_id: DEFAULT_AGENT_ALIAS_ID.into(),
            region: None,
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

/// Simulated agent section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CannedYamlConfig {
    pub delay_ms: u64,
}

impl Default for CannedYamlConfig {
    fn default() -> Self {
        Self { delay_ms: 1500 }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub upstream_mode: UpstreamMode,
    pub agent_endpoint: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub agent_region: Option<String>,
    pub agent_api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Thinking time of the simulated agent
    pub canned_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

/// Non-empty env var
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_yaml(Self::load_yaml(yaml_path));

        if let Some(host) = env_var("SERVER_HOST") {
            config.server_host = host;
        }
        if let Some(port) = env_var("SERVER_PORT").and_then(|s| s.parse().ok()) {
            config.server_port = port;
        }
        if let Some(mode) = env_var("UPSTREAM_MODE") {
            match mode.parse() {
                Ok(mode) => config.upstream_mode = mode,
                Err(e) => tracing::warn!("Ignoring UPSTREAM_MODE: {}", e),
            }
        }
        if let Some(endpoint) = env_var("AGENT_ENDPOINT") {
            config.agent_endpoint = endpoint;
        }
        if let Some(agent_id) = env_var("AGENT_ID") {
            config.agent_id = agent_id;
        }
        if let Some(alias_id) = env_var("AGENT_ALIAS_ID") {
            config.agent_alias_id = alias_id;
        }
        if let Some(region) = env_var("AGENT_REGION") {
            config.agent_region = Some(region);
        }
        if let Some(key) = env_var("AGENT_API_KEY") {
            config.agent_api_key = Some(key);
        }
        if let Some(secs) = env_var("UPSTREAM_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.request_timeout_secs = secs;
        }
        if let Some(ms) = env_var("CANNED_DELAY_MS").and_then(|s| s.parse().ok()) {
            config.canned_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            server_host: yaml.server.host,
            server_port: yaml.server.port,
            upstream_mode: yaml.upstream.mode,
            agent_endpoint: yaml.upstream.endpoint,
            agent_id: yaml.upstream.agent_id,
            agent_alias_id: yaml.upstream.agent_alias_id,
            agent_region: yaml.upstream.region.filter(|r| !r.is_empty()),
            agent_api_key: yaml.upstream.api_key.filter(|k| !k.is_empty()),
            request_timeout_secs: yaml.upstream.request_timeout_secs,
            canned_delay: Duration::from_millis(yaml.canned.delay_ms),
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// Connection settings for the HTTP agent backend
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            endpoint: self.agent_endpoint.clone(),
            agent_id: self.agent_id.clone(),
            agent_alias_id: self.agent_alias_id.clone(),
            region: self.agent_region.clone(),
            api_key: self.agent_api_key.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Socket address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: RelaySession,
    pub registry: Arc<ConnectionRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state with the backend selected by the config
    pub fn new(config: Config) -> Result<Self> {
        let backend = upstream::build_backend(
            config.upstream_mode,
            &config.agent_settings(),
            config.canned_delay,
        )?;
        Ok(Self::with_backend(config, backend))
    }

    /// Create application state around an explicit backend
    pub fn with_backend(config: Config, backend: Arc<dyn InferenceBackend>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = RelaySession::new(backend, registry.clone());
        Self {
            relay,
            registry,
            config: Arc::new(config),
        }
    }
}

/// Bind the configured address and serve the relay until Ctrl-C
pub async fn start_server(config: Config) -> Result<()> {
    let addr = config.bind_addr();
    let state = AppState::new(config)?;
    let backend = state.relay.backend_name().to_string();
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Relay listening on {} (upstream: {})", addr, backend);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Relay server exited unexpectedly")?;

    tracing::info!("Relay stopped");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
