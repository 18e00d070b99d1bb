pub mod memory;
pub mod models;
pub mod postgres;
pub mod query;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Document, DocumentSnapshot, ID_FIELD};
pub use postgres::PgDocumentStore;
pub use query::{CollectionQuery, Direction, Predicate, SortKey, WhereOp};
pub use store::{DocumentStore, SnapshotCallback, SnapshotSource, StoreError, StoreResult, Subscription};
