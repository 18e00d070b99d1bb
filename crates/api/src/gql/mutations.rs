use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, InputValue, ObjectAccessor, TypeRef};

use docql_infra::{Document, DocumentSnapshot, DocumentStore, StoreResult, ID_FIELD};

use super::entity::EntityType;
use super::error::GqlError;
use super::types::{Record, ResourceId, RESOURCE_ID};

/// Insert a document and return it with the store-assigned id attached.
pub async fn create(store: &dyn DocumentStore, collection: &str, data: Document) -> StoreResult<Document> {
    let id = store.add(collection, data.clone()).await?;
    tracing::debug!(collection, id = %id, "document created");
    Ok(DocumentSnapshot::new(id, data).into_document())
}

/// Merge the supplied attributes into an existing document.
pub async fn update(store: &dyn DocumentStore, collection: &str, id: &str, data: Document) -> StoreResult<String> {
    store.update(collection, id, data).await?;
    tracing::debug!(collection, id, "document updated");
    Ok(id.to_string())
}

/// Remove a document. Deleting an absent id is not an error here; only the
/// store can fail the call.
pub async fn delete(store: &dyn DocumentStore, collection: &str, id: &str) -> StoreResult<String> {
    store.delete(collection, id).await?;
    tracing::debug!(collection, id, "document deleted");
    Ok(id.to_string())
}

/// Supplied arguments other than `id`, as document attributes. Arguments the
/// caller left out are absent from the result.
fn payload(args: &ObjectAccessor<'_>) -> async_graphql::Result<Document> {
    args.iter()
        .filter(|(name, _)| name.as_str() != ID_FIELD)
        .map(|(name, value)| -> async_graphql::Result<(String, serde_json::Value)> {
            Ok((name.to_string(), value.as_value().clone().into_json()?))
        })
        .collect()
}

fn required_id(args: &ObjectAccessor<'_>) -> async_graphql::Result<String> {
    Ok(args.try_get(ID_FIELD)?.string()?.to_string())
}

fn id_argument() -> InputValue {
    InputValue::new(ID_FIELD, TypeRef::named_nn(TypeRef::ID))
}

/// `createUser(<data fields>): User!`
pub fn create_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let collection = entity.collection().to_string();
    let field = Field::new(format!("create{}", entity.name()), TypeRef::named_nn(entity.name()), move |ctx| {
        let store = store.clone();
        let collection = collection.clone();
        FieldFuture::new(async move {
            let data = payload(&ctx.args)?;
            let document = create(store.as_ref(), &collection, data)
                .await
                .map_err(GqlError::from)?;
            Ok(Some(Record::new(collection, document).into_field_value()))
        })
    });

    entity
        .data_fields()
        .iter()
        .fold(field, |field, def| field.argument(InputValue::new(&def.name, def.type_ref())))
}

/// `updateUser(id: ID!, <data fields, all optional>): ResourceID!`
pub fn update_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let collection = entity.collection().to_string();
    let field = Field::new(format!("update{}", entity.name()), TypeRef::named_nn(RESOURCE_ID), move |ctx| {
        let store = store.clone();
        let collection = collection.clone();
        FieldFuture::new(async move {
            let id = required_id(&ctx.args)?;
            let data = payload(&ctx.args)?;
            let id = update(store.as_ref(), &collection, &id, data)
                .await
                .map_err(GqlError::from)?;
            Ok(Some(ResourceId(id).into_field_value()))
        })
    })
    .argument(id_argument());

    entity.data_fields().iter().fold(field, |field, def| {
        field.argument(InputValue::new(&def.name, def.nullable_type_ref()))
    })
}

/// `deleteUser(id: ID!): ResourceID!`
pub fn delete_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let collection = entity.collection().to_string();
    Field::new(format!("delete{}", entity.name()), TypeRef::named_nn(RESOURCE_ID), move |ctx| {
        let store = store.clone();
        let collection = collection.clone();
        FieldFuture::new(async move {
            let id = required_id(&ctx.args)?;
            let id = delete(store.as_ref(), &collection, &id)
                .await
                .map_err(GqlError::from)?;
            Ok(Some(ResourceId(id).into_field_value()))
        })
    })
    .argument(id_argument())
}
