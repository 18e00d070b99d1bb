use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{Document, DocumentRow, DocumentSnapshot, ID_FIELD};
use crate::query::CollectionQuery;
use crate::store::{
    DocumentStore, SnapshotCallback, SnapshotSource, StoreError, StoreResult, Subscription,
};

/// Channel the `documents` trigger notifies with the written collection path.
pub const CHANGE_CHANNEL: &str = "docql_changes";

const DOCUMENT_COLUMNS: &str = "collection, id, data, created_at, updated_at";

/// Document store over a single JSONB table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `documents` table and its change trigger.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

/// JSONB expression for a field path; `id` is the row identifier.
fn push_field(builder: &mut QueryBuilder<'static, Postgres>, path: &str) {
    if path == ID_FIELD {
        builder.push("to_jsonb(id)");
    } else {
        builder.push("data #> ");
        builder.push_bind(path_segments(path));
    }
}

/// Rank of the JSON kind at a path: null < boolean < number < string < array
/// < object. jsonb's own ordering puts strings before numbers.
fn push_kind_rank(builder: &mut QueryBuilder<'static, Postgres>, path: &str) {
    builder.push("CASE jsonb_typeof(");
    push_field(builder, path);
    builder.push(
        ") WHEN 'null' THEN 1 WHEN 'boolean' THEN 2 WHEN 'number' THEN 3 \
         WHEN 'string' THEN 4 WHEN 'array' THEN 5 ELSE 6 END",
    );
}

/// Build the SELECT for a query. Comparisons only hold between values of the
/// same JSON kind, and ordering on a path excludes documents without it.
fn build_select(query: &CollectionQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = "));
    builder.push_bind(query.collection.clone());

    for predicate in &query.predicates {
        let value = Json(predicate.value.clone());
        builder.push(" AND jsonb_typeof(");
        push_field(&mut builder, &predicate.path);
        builder.push(") = jsonb_typeof(");
        builder.push_bind(value.clone());
        builder.push(") AND ");
        push_field(&mut builder, &predicate.path);
        builder.push(format!(" {} ", predicate.op.sql()));
        builder.push_bind(value);
    }

    for key in &query.sort_keys {
        builder.push(" AND ");
        push_field(&mut builder, &key.path);
        builder.push(" IS NOT NULL");
    }

    builder.push(" ORDER BY ");
    for key in &query.sort_keys {
        let direction = key.direction.sql();
        push_kind_rank(&mut builder, &key.path);
        builder.push(format!(" {direction}, "));
        push_field(&mut builder, &key.path);
        builder.push(format!(" {direction}, "));
    }
    builder.push("id ASC");
    builder
}

async fn fetch(pool: &PgPool, query: &CollectionQuery) -> StoreResult<Vec<DocumentSnapshot>> {
    let mut builder = build_select(query);
    let rows = builder
        .build_query_as::<DocumentRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(DocumentSnapshot::from).collect())
}

async fn watch(pool: PgPool, query: CollectionQuery, callback: &SnapshotCallback) -> StoreResult<()> {
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    tracing::debug!(collection = %query.collection, "listening for document changes");

    callback(Ok(fetch(&pool, &query).await?));
    loop {
        let notification = listener.recv().await?;
        if notification.payload() != query.collection {
            continue;
        }
        callback(Ok(fetch(&pool, &query).await?));
    }
}

impl SnapshotSource for PgDocumentStore {
    fn listen(&self, query: CollectionQuery, callback: SnapshotCallback) -> StoreResult<Subscription> {
        let pool = self.pool.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = watch(pool, query, &callback).await {
                tracing::error!("document listener failed: {e}");
                callback(Err(e));
            }
        });
        Ok(Subscription::new(move || handle.abort()))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DocumentSnapshot::from))
    }

    async fn query(&self, query: &CollectionQuery) -> StoreResult<Vec<DocumentSnapshot>> {
        fetch(&self.pool, query).await
    }

    async fn add(&self, collection: &str, data: Document) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(data))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = NOW()
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DocumentMissing {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
