mod common;

use std::sync::Arc;

use async_graphql::Variables;
use docql_api::gql::{EntityType, FieldDef, ScalarType, SchemaBuilder};
use docql_infra::{DocumentStore, MemoryStore};
use serde_json::json;

use common::*;

#[tokio::test]
async fn test_point_lookup_attaches_identifier() {
    let schema = test_schema(setup_test_store().await);

    let response = execute_graphql(&schema, r#"{ user(id: "u2") { id name age active } }"#, None).await;

    assert_eq!(
        data(response),
        json!({ "user": { "id": "u2", "name": "Grace", "age": 45, "active": false } })
    );
}

#[tokio::test]
async fn test_point_lookup_of_missing_document_fails() {
    let schema = test_schema(setup_test_store().await);

    let response = execute_graphql(&schema, r#"{ user(id: "nobody") { id } }"#, None).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Document with nobody not found");
}

#[tokio::test]
async fn test_missing_attributes_resolve_to_null() {
    let schema = test_schema(setup_test_store().await);

    let response = execute_graphql(&schema, r#"{ user(id: "u4") { name active } }"#, None).await;

    assert_eq!(data(response), json!({ "user": { "name": "Barbara", "active": null } }));
}

#[tokio::test]
async fn test_list_without_arguments_returns_every_document() {
    let schema = test_schema(setup_test_store().await);

    let value = data(execute_graphql(&schema, "{ users { id } }", None).await);

    assert_eq!(ids(&value["users"]), vec!["u1", "u2", "u3", "u4"]);
}

#[tokio::test]
async fn test_filter_comparison() {
    let schema = test_schema(setup_test_store().await);

    let value = data(execute_graphql(&schema, "{ users(filter: { age_gte: 36 }) { id } }", None).await);

    assert_eq!(ids(&value["users"]), vec!["u1", "u2", "u4"]);
}

#[tokio::test]
async fn test_filter_keys_are_anded() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(
            &schema,
            "{ users(filter: { age: 36, active: true }) { id } }",
            None,
        )
        .await,
    );

    assert_eq!(ids(&value["users"]), vec!["u1"]);
}

#[tokio::test]
async fn test_filter_range_on_strings() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(
            &schema,
            r#"{ users(filter: { name_gt: "B", name_lt: "H" }) { id } }"#,
            None,
        )
        .await,
    );

    assert_eq!(ids(&value["users"]), vec!["u2", "u4"]);
}

#[tokio::test]
async fn test_null_filter_matches_stored_nulls_only() {
    let store = setup_test_store().await;
    store
        .set("users", "u5", doc(json!({ "name": "Edsger", "active": null })))
        .await
        .expect("seed user");
    let schema = test_schema(store);

    let value = data(execute_graphql(&schema, "{ users(filter: { active: null }) { id } }", None).await);

    // u4 has no `active` at all and is not a match.
    assert_eq!(ids(&value["users"]), vec!["u5"]);
}

#[tokio::test]
async fn test_field_named_like_an_operator_filters_by_equality() {
    let store = Arc::new(MemoryStore::new());
    for (id, size) in [("i1", 5), ("i2", 3)] {
        store
            .set("items", id, doc(json!({ "size_lt": size })))
            .await
            .expect("seed item");
    }
    let schema = SchemaBuilder::new(store)
        .entity(EntityType::new(
            "Item",
            "items",
            vec![FieldDef::scalar("size_lt", ScalarType::Int)],
        ))
        .finish()
        .expect("Failed to build schema");

    let equal = data(execute_graphql(&schema, "{ items(filter: { size_lt: 5 }) { id } }", None).await);
    let below = data(execute_graphql(&schema, "{ items(filter: { size_lt_lt: 5 }) { id } }", None).await);

    assert_eq!(ids(&equal["items"]), vec!["i1"]);
    assert_eq!(ids(&below["items"]), vec!["i2"]);
}

#[tokio::test]
async fn test_filter_from_variables() {
    let schema = test_schema(setup_test_store().await);
    let variables = Variables::from_json(json!({ "filter": { "age_lt": 40 } }));

    let value = data(
        execute_graphql(
            &schema,
            "query Young($filter: UserFilter) { users(filter: $filter) { id } }",
            Some(variables),
        )
        .await,
    );

    assert_eq!(ids(&value["users"]), vec!["u1", "u3", "u4"]);
}

#[tokio::test]
async fn test_undeclared_filter_keys_are_rejected() {
    let schema = test_schema(setup_test_store().await);

    let response = execute_graphql(&schema, r#"{ users(filter: { nickname: "x" }) { id } }"#, None).await;

    assert!(!response.errors.is_empty());
}

#[tokio::test]
async fn test_order_by_composes_priority_keys() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(&schema, "{ users(orderBy: [AGE_DESC, NAME_ASC]) { id } }", None).await,
    );

    assert_eq!(ids(&value["users"]), vec!["u2", "u1", "u4", "u3"]);
}

#[tokio::test]
async fn test_single_order_value_is_accepted() {
    let schema = test_schema(setup_test_store().await);

    let value = data(execute_graphql(&schema, "{ users(orderBy: AGE_ASC) { id } }", None).await);

    // Equal ages fall back to identifier order.
    assert_eq!(ids(&value["users"]), vec!["u3", "u1", "u4", "u2"]);
}

#[tokio::test]
async fn test_order_by_skips_documents_without_the_attribute() {
    let schema = test_schema(setup_test_store().await);

    let value = data(execute_graphql(&schema, "{ users(orderBy: [ACTIVE_DESC]) { id } }", None).await);

    assert_eq!(ids(&value["users"]), vec!["u1", "u3", "u2"]);
}

#[tokio::test]
async fn test_filter_and_order_together() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(
            &schema,
            r#"{ users(cursor: "u9", filter: { active: true }, orderBy: [NAME_DESC]) { name } }"#,
            None,
        )
        .await,
    );

    assert_eq!(value, json!({ "users": [{ "name": "Linus" }, { "name": "Ada" }] }));
}

#[tokio::test]
async fn test_nested_collection_queries_under_parent() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(
            &schema,
            r#"{ user(id: "u1") { name posts(orderBy: [RATING_DESC]) { id title } } }"#,
            None,
        )
        .await,
    );

    assert_eq!(
        value,
        json!({ "user": { "name": "Ada", "posts": [
            { "id": "p2", "title": "Notes" },
            { "id": "p1", "title": "Engines" }
        ] } })
    );
}

#[tokio::test]
async fn test_nested_collection_of_other_parent_is_empty() {
    let schema = test_schema(setup_test_store().await);

    let value = data(
        execute_graphql(&schema, r#"{ user(id: "u2") { posts { id } } }"#, None).await,
    );

    assert_eq!(value, json!({ "user": { "posts": [] } }));
}
