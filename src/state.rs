use std::sync::Arc;

use crate::db::DurableStore;
use crate::services::{EnrollmentStore, SyncOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub store: DurableStore,
    pub sync: Arc<SyncOrchestrator>,
    pub enrollment: EnrollmentStore,
}

impl AppState {
    pub fn new(store: DurableStore, sync: Arc<SyncOrchestrator>) -> Self {
        let enrollment = EnrollmentStore::new(store.primary().clone());
        Self {
            store,
            sync,
            enrollment,
        }
    }
}
