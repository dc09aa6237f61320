//! Application state
//!
//! Shared handles for the Axum application.

use std::sync::Arc;

use crate::services::ConsensusService;
use crate::store::{BroadcastPublisher, InMemoryChannelStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    store: Arc<InMemoryChannelStore>,
    publisher: Arc<BroadcastPublisher>,
    consensus: Arc<ConsensusService>,
}

impl AppState {
    /// Wire the consensus engine to the given store
    pub fn new(store: Arc<InMemoryChannelStore>) -> Self {
        let publisher = Arc::new(BroadcastPublisher::new(store.clone()));
        let consensus = Arc::new(ConsensusService::new(store.clone(), publisher.clone()));
        Self {
            store,
            publisher,
            consensus,
        }
    }

    pub fn store(&self) -> &InMemoryChannelStore {
        &self.store
    }

    pub fn publisher(&self) -> &BroadcastPublisher {
        &self.publisher
    }

    pub fn consensus(&self) -> &ConsensusService {
        &self.consensus
    }

    /// Shared handle to the engine, for in-process callers
    pub fn consensus_handle(&self) -> Arc<ConsensusService> {
        self.consensus.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("consensus", &self.consensus)
            .finish_non_exhaustive()
    }
}
