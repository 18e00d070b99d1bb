use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, DocumentSnapshot};
use crate::query::CollectionQuery;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("document `{collection}/{id}` does not exist")]
    DocumentMissing { collection: String, id: String },

    #[error("invalid document data: {0}")]
    Data(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Receives the full current result set of a listened query on every change.
/// An `Err` reports an upstream failure; no further snapshots follow it.
pub type SnapshotCallback = Box<dyn Fn(StoreResult<Vec<DocumentSnapshot>>) + Send + Sync>;

/// Handle to a live listener registration. Releasing happens at most once,
/// either through [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Push-based change notification for a query.
pub trait SnapshotSource: Send + Sync {
    fn listen(&self, query: CollectionQuery, callback: SnapshotCallback) -> StoreResult<Subscription>;
}

/// Capability interface of the backing document store.
#[async_trait]
pub trait DocumentStore: SnapshotSource {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>>;

    async fn query(&self, query: &CollectionQuery) -> StoreResult<Vec<DocumentSnapshot>>;

    /// Insert with a store-assigned identifier.
    async fn add(&self, collection: &str, data: Document) -> StoreResult<String>;

    /// Insert or replace under a caller-chosen identifier.
    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()>;

    /// Merge `patch` into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> StoreResult<()>;

    /// Remove a document. Absent documents are not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
