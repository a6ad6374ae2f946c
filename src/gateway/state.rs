use std::sync::Arc;

use crate::transfer::TransferOrchestrator;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<TransferOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
