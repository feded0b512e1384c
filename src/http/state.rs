use crate::session::OrchestratorHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrchestratorHandle,
}

impl AppState {
    pub fn new(orchestrator: OrchestratorHandle) -> Self {
        Self { orchestrator }
    }
}
