//! Changeflow server - RFC/MOC approval workflow engine

pub mod attachments;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod workflow;

use sqlx::SqlitePool;
use std::sync::Arc;

use attachments::{BlobStore, NoopBlobStore};
use store::Store;
use workflow::WorkflowEngine;

/// Application state shared across handlers
pub struct AppState {
    pub engine: WorkflowEngine,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Self::with_blob_store(pool, Arc::new(NoopBlobStore))
    }

    pub fn with_blob_store(pool: SqlitePool, blob: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            engine: WorkflowEngine::new(Store::new(pool), blob),
        })
    }
}
