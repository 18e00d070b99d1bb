use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::{Document, DocumentSnapshot};
use crate::query::CollectionQuery;
use crate::store::{
    DocumentStore, SnapshotCallback, SnapshotSource, StoreError, StoreResult, Subscription,
};

type SharedCallback = Arc<dyn Fn(StoreResult<Vec<DocumentSnapshot>>) + Send + Sync>;

struct Listener {
    query: CollectionQuery,
    callback: SharedCallback,
}

#[derive(Default)]
struct State {
    /// Collection path -> documents ordered by id.
    collections: HashMap<String, BTreeMap<String, Document>>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
}

impl State {
    fn run(&self, query: &CollectionQuery) -> Vec<DocumentSnapshot> {
        let Some(documents) = self.collections.get(&query.collection) else {
            return Vec::new();
        };
        query.apply(
            documents
                .iter()
                .map(|(id, data)| DocumentSnapshot::new(id.clone(), data.clone())),
        )
    }

    fn pending_notifications(&self, collection: &str) -> Vec<(SharedCallback, Vec<DocumentSnapshot>)> {
        self.listeners
            .values()
            .filter(|l| l.query.collection == collection)
            .map(|l| (l.callback.clone(), self.run(&l.query)))
            .collect()
    }
}

/// Process-local document store.
///
/// Listeners get the current result set on registration and again after every
/// write to their collection. Callbacks never run under the state lock, but
/// deliveries are serialized so a listener sees result sets in write order.
/// A callback must not write to or listen on the store it is registered with.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    delivery: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn write<T>(&self, collection: &str, f: impl FnOnce(&mut State) -> StoreResult<T>) -> StoreResult<T> {
        let _delivery = self.delivery.lock();
        let (out, notifications) = {
            let mut state = self.state.lock();
            let out = f(&mut state)?;
            (out, state.pending_notifications(collection))
        };
        for (callback, snapshots) in notifications {
            callback(Ok(snapshots));
        }
        Ok(out)
    }
}

fn release(state: Weak<Mutex<State>>, key: u64) {
    if let Some(state) = state.upgrade() {
        state.lock().listeners.remove(&key);
    }
}

impl SnapshotSource for MemoryStore {
    fn listen(&self, query: CollectionQuery, callback: SnapshotCallback) -> StoreResult<Subscription> {
        let callback: SharedCallback = Arc::from(callback);
        let _delivery = self.delivery.lock();
        let (key, initial) = {
            let mut state = self.state.lock();
            let key = state.next_listener;
            state.next_listener += 1;
            let initial = state.run(&query);
            tracing::debug!(collection = %query.collection, listener = key, "listener registered");
            state.listeners.insert(
                key,
                Listener {
                    query,
                    callback: callback.clone(),
                },
            );
            (key, initial)
        };
        callback(Ok(initial));

        let state = Arc::downgrade(&self.state);
        Ok(Subscription::new(move || release(state, key)))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        let state = self.state.lock();
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| DocumentSnapshot::new(id, data.clone())))
    }

    async fn query(&self, query: &CollectionQuery) -> StoreResult<Vec<DocumentSnapshot>> {
        Ok(self.state.lock().run(query))
    }

    async fn add(&self, collection: &str, data: Document) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(collection, |state| {
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), data);
            Ok(id)
        })
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        self.write(collection, |state| {
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data);
            Ok(())
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> StoreResult<()> {
        self.write(collection, |state| {
            let existing = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::DocumentMissing {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            existing.extend(patch);
            Ok(())
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.write(collection, |state| {
            if let Some(docs) = state.collections.get_mut(collection) {
                docs.remove(id);
            }
            Ok(())
        })
    }
}
