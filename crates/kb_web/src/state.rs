use kb_transport::{MockConfig, MockStore, MockTransport};
use std::sync::Arc;

/// Shared by every request: the fixture backend the server fronts.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<MockTransport>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self::with_store(MockStore::default(), config)
    }

    pub fn with_store(store: MockStore, config: MockConfig) -> Self {
        Self {
            transport: Arc::new(MockTransport::with_store(store, config)),
        }
    }

    pub fn store(&self) -> &MockStore {
        self.transport.store()
    }
}
