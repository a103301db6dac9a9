//! Server state

use std::sync::Arc;

use crate::authn::token::TokenService;
use crate::datastore::DataStore;
use crate::deploy::orchestrator::StackOrchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<StackOrchestrator>,
    pub store: Arc<dyn DataStore>,
    pub tokens: Arc<TokenService>,
}

impl ServerState {
    pub fn new(
        orchestrator: Arc<StackOrchestrator>,
        store: Arc<dyn DataStore>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            tokens,
        }
    }
}
