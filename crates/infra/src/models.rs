use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// Attribute mapping of a stored document.
pub type Document = serde_json::Map<String, Value>;

/// Attribute key the identifier is exposed under.
pub const ID_FIELD: &str = "id";

/// Materialized state of one document at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Attributes with the identifier re-attached under `id`.
    ///
    /// The store does not keep the identifier inside the attribute set, and a
    /// stray `id` attribute must never shadow the real one.
    pub fn into_document(self) -> Document {
        let mut data = self.data;
        data.insert(ID_FIELD.to_string(), Value::String(self.id));
        data
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub collection: String,
    pub id: String,
    pub data: Json<Document>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for DocumentSnapshot {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            data: row.data.0,
        }
    }
}
