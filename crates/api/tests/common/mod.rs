#![allow(dead_code)]

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Variables};
use docql_api::gql::{build_schema, EntityType, FieldDef, ScalarType, SchemaConfig};
use docql_api::AppState;
use docql_infra::{Document, DocumentStore, MemoryStore};
use serde_json::{json, Value};

pub fn entities() -> Vec<EntityType> {
    vec![
        EntityType::new(
            "User",
            "users",
            vec![
                FieldDef::required("name", ScalarType::String),
                FieldDef::scalar("age", ScalarType::Int),
                FieldDef::scalar("active", ScalarType::Boolean),
                FieldDef::collection("posts", "Post"),
            ],
        ),
        EntityType::new(
            "Post",
            "posts",
            vec![
                FieldDef::required("title", ScalarType::String),
                FieldDef::scalar("rating", ScalarType::Float),
            ],
        ),
    ]
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("document must be an object")
}

/// Four users (u4 has no `active`) and two posts nested under u1.
pub async fn setup_test_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let users = [
        ("u1", json!({ "name": "Ada", "age": 36, "active": true })),
        ("u2", json!({ "name": "Grace", "age": 45, "active": false })),
        ("u3", json!({ "name": "Linus", "age": 28, "active": true })),
        ("u4", json!({ "name": "Barbara", "age": 36 })),
    ];
    for (id, data) in users {
        store.set("users", id, doc(data)).await.expect("seed user");
    }
    let posts = [
        ("p1", json!({ "title": "Engines", "rating": 3.0 })),
        ("p2", json!({ "title": "Notes", "rating": 4.5 })),
    ];
    for (id, data) in posts {
        store.set("users/u1/posts", id, doc(data)).await.expect("seed post");
    }
    store
}

pub fn test_schema(store: Arc<MemoryStore>) -> Schema {
    let state = AppState::with_store(store);
    build_schema(&state, entities(), SchemaConfig::default()).expect("Failed to build schema")
}

/// Helper function to execute GraphQL queries and mutations
pub async fn execute_graphql(schema: &Schema, query: &str, variables: Option<Variables>) -> async_graphql::Response {
    let mut request = Request::new(query);

    if let Some(vars) = variables {
        request = request.variables(vars);
    }

    schema.execute(request).await
}

/// Data of a response that must have succeeded.
pub fn data(response: async_graphql::Response) -> Value {
    assert!(response.errors.is_empty(), "GraphQL errors: {:?}", response.errors);
    response.data.into_json().expect("response data is JSON")
}

pub fn ids(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .expect("list result")
        .iter()
        .map(|item| item["id"].as_str().expect("id"))
        .collect()
}
