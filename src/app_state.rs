use std::sync::Arc;

use crate::services::{queue::JobQueue, store::JobStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(store: Arc<JobStore>, queue: JobQueue) -> Self {
        Self { store, queue }
    }
}
