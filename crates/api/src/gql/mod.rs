pub mod contracts;
pub mod entity;
pub mod error;
pub mod mutations;
pub mod queries;
pub mod schema;
pub mod subscriptions;
pub mod translate;
pub mod types;

pub use entity::{EntityType, FieldDef, FieldKind, ScalarType};
pub use schema::{build_schema, SchemaBuildError, SchemaBuilder, SchemaConfig};
pub use subscriptions::{ChangeEvent, ChangeStream};
