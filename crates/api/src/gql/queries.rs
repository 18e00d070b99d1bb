use std::sync::Arc;

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, ObjectAccessor, ResolverContext, TypeRef,
};

use docql_infra::{DocumentStore, ID_FIELD};

use super::contracts::{list_arguments, FilterContract, OrderContract};
use super::entity::EntityType;
use super::error::GqlError;
use super::translate::{self, FilterKey, ListArgs};
use super::types::Record;

/// Read `cursor`, `filter` and `orderBy` off a plural field's arguments.
///
/// Filter entries keep the order they were supplied in and are resolved
/// through the entity's filter contract; an explicit `null` is an equality
/// test against stored nulls. Order enumerants are mapped to their wire
/// values through the order contract.
pub fn list_args(
    args: &ObjectAccessor<'_>,
    contract: &FilterContract,
    order: &OrderContract,
) -> async_graphql::Result<ListArgs> {
    let cursor = match args.get("cursor") {
        Some(value) if !value.is_null() => Some(value.string()?.to_string()),
        _ => None,
    };

    let filter = match args.get("filter") {
        Some(value) if !value.is_null() => value
            .object()?
            .iter()
            .map(|(key, v)| -> async_graphql::Result<(FilterKey, serde_json::Value)> {
                let key = contract.resolve(key).unwrap_or_else(|| FilterKey::decode(key));
                Ok((key, v.as_value().clone().into_json()?))
            })
            .collect::<async_graphql::Result<Vec<_>>>()?,
        _ => Vec::new(),
    };

    let order_names: Vec<String> = match args.get("orderBy") {
        Some(value) if !value.is_null() => match value.list() {
            Ok(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| item.enum_name().map(str::to_string))
                .collect::<async_graphql::Result<_>>()?,
            // A single enumerant coerces to a one-element list.
            Err(_) => vec![value.enum_name()?.to_string()],
        },
        _ => Vec::new(),
    };

    let order_by = order_names
        .iter()
        .map(|name| {
            order
                .value_of(name)
                .map(str::to_string)
                .ok_or_else(|| GqlError::new(format!("Unknown order value {name}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ListArgs {
        cursor,
        filter,
        order_by,
    })
}

/// `user(id: ID!): User!`
pub fn single_query_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let collection = entity.collection().to_string();
    Field::new(entity.singular_name(), TypeRef::named_nn(entity.name()), move |ctx| {
        let store = store.clone();
        let collection = collection.clone();
        FieldFuture::new(async move {
            let id = ctx.args.try_get(ID_FIELD)?.string()?.to_string();
            let document = translate::get(store.as_ref(), &collection, &id)
                .await
                .map_err(GqlError::from)?;
            Ok(Some(Record::new(collection, document).into_field_value()))
        })
    })
    .description(format!("Fetch one `{}` by id", entity.name()))
    .argument(InputValue::new(ID_FIELD, TypeRef::named_nn(TypeRef::ID)))
}

/// `users(cursor: ID, filter: UserFilter, orderBy: [UserOrderBy]): [User!]!`
pub fn list_query_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let collection = entity.collection().to_string();
    list_field(entity.plural_name(), entity, store, move |_| Ok(collection.clone()))
        .description(format!("List `{}` documents", entity.name()))
}

/// Nested collection `field` of the parent record, typed as `target`.
pub fn subcollection_field(field: &str, target: &EntityType, store: Arc<dyn DocumentStore>) -> Field {
    let field_name = field.to_string();
    list_field(field.to_string(), target, store, move |ctx| {
        let parent = ctx.parent_value.try_downcast_ref::<Record>()?;
        parent
            .subcollection_path(&field_name)
            .ok_or_else(|| GqlError::new("Parent document has no id").into())
    })
}

fn list_field<F>(name: String, target: &EntityType, store: Arc<dyn DocumentStore>, collection_of: F) -> Field
where
    F: Fn(&ResolverContext<'_>) -> async_graphql::Result<String> + Send + Sync + 'static,
{
    let filter = Arc::new(target.filter().clone());
    let order = Arc::new(target.order().clone());
    let collection_of = Arc::new(collection_of);

    let field = Field::new(name, TypeRef::named_nn_list_nn(target.name()), move |ctx| {
        let store = store.clone();
        let filter = filter.clone();
        let order = order.clone();
        let collection_of = collection_of.clone();
        FieldFuture::new(async move {
            let collection = collection_of(&ctx)?;
            let args = list_args(&ctx.args, &filter, &order)?;
            let documents = translate::list(store.as_ref(), &collection, &args)
                .await
                .map_err(GqlError::from)?;
            Ok(Some(FieldValue::list(
                documents
                    .into_iter()
                    .map(|document| Record::new(collection.clone(), document).into_field_value()),
            )))
        })
    });

    list_arguments(target.filter(), target.order())
        .into_iter()
        .fold(field, |field, argument| field.argument(argument))
}
