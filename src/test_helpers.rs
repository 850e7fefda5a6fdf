//! Test helper factories
//!
//! Builds relay sessions wired to scripted backends and recording gateways, and
//! an `AppState` with no network dependencies.
#![allow(dead_code)]

pub use crate::gateway::RecordingGateway;
pub use crate::upstream::{ScriptStep, ScriptedBackend};

use crate::gateway::ConnectionRegistry;
use crate::relay::RelaySession;
use crate::upstream::{CannedBackend, InferenceBackend, UpstreamMode};
use crate::{AppState, Config};
use std::sync::Arc;
use std::time::Duration;

/// Relay session over the given backend and gateway, handing back shared
/// handles to both for assertions
pub fn relay_with(
    backend: ScriptedBackend,
    gateway: RecordingGateway,
) -> (RelaySession, Arc<ScriptedBackend>, Arc<RecordingGateway>) {
    let backend = Arc::new(backend);
    let gateway = Arc::new(gateway);
    let relay = RelaySession::new(backend.clone(), gateway.clone());
    (relay, backend, gateway)
}

/// Config with defaults, canned mode and no delay
pub fn test_config() -> Config {
    Config {
        upstream_mode: UpstreamMode::Canned,
        canned_delay: Duration::ZERO,
        ..Config::default()
    }
}

/// AppState whose relay pushes into a fresh registry
pub fn mock_app_state(backend: Arc<dyn InferenceBackend>) -> AppState {
    AppState::with_backend(test_config(), backend)
}

/// AppState with an instant canned backend
pub fn canned_app_state() -> AppState {
    mock_app_state(Arc::new(CannedBackend::with_delay(Duration::ZERO)))
}

/// The registry behind an `AppState`
pub fn registry_of(state: &AppState) -> Arc<ConnectionRegistry> {
    state.registry.clone()
}
