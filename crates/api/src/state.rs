use std::sync::Arc;

use docql_infra::{DocumentStore, MemoryStore, PgDocumentStore};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// Set when documents live in Postgres; used by the health probe.
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            db: None,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            store: Arc::new(PgDocumentStore::new(pool.clone())),
            db: Some(pool),
        }
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, db: None }
    }
}
