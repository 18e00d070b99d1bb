//! Adapters at the GraphQL transport boundary.
//!
//! A [`Link`] turns one [`Operation`] into a stream of results: `Ok` items are
//! data events, `Err` items are error events, and the end of the stream is
//! completion. Links compose by holding the next link in the chain.

pub mod execution;
pub mod subscription;

use std::sync::Arc;

use async_graphql::parser::parse_query;
use async_graphql::parser::types::{DocumentOperations, OperationType};
use async_graphql::{Request, Response, ServerError, Variables};
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use execution::ExecutionLink;
pub use subscription::SubscriptionLink;

#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("{}", .0.message)]
    Field(ServerError),

    #[error("invalid operation document: {0}")]
    Parse(String),
}

pub type ResultStream = BoxStream<'static, Result<Response, LinkError>>;

/// One GraphQL operation travelling through a link chain. The document and
/// variables are shared, so forwarding never copies them.
#[derive(Debug, Clone)]
pub struct Operation {
    pub query: Arc<str>,
    pub operation_name: Option<String>,
    pub variables: Arc<Variables>,
}

impl Operation {
    pub fn new(query: impl Into<Arc<str>>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Arc::new(Variables::default()),
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = Arc::new(variables);
        self
    }

    pub fn to_request(&self) -> Request {
        let request = Request::new(self.query.as_ref()).variables(self.variables.as_ref().clone());
        match &self.operation_name {
            Some(name) => request.operation_name(name.as_str()),
            None => request,
        }
    }
}

pub trait Link: Send + Sync {
    fn request(&self, operation: Operation) -> ResultStream;
}

/// Type of the operation a request would run.
///
/// With a name, the operation of that name. Without one, the only operation
/// of the document; `None` if the document holds several or the name matches
/// nothing.
pub fn operation_type(query: &str, operation_name: Option<&str>) -> Result<Option<OperationType>, LinkError> {
    let document = parse_query(query).map_err(|e| LinkError::Parse(e.to_string()))?;
    let operation_name = operation_name.filter(|name| !name.is_empty());

    let ty = match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Some(operation.node.ty),
        // The single operation is anonymous.
        (DocumentOperations::Single(_), Some(_)) => None,
        (DocumentOperations::Multiple(operations), Some(name)) => {
            operations.get(name).map(|operation| operation.node.ty)
        }
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => {
            operations.values().next().map(|operation| operation.node.ty)
        }
        (DocumentOperations::Multiple(_), None) => None,
    };
    Ok(ty)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gql::{EntityType, FieldDef, ScalarType, SchemaBuilder};
    use async_graphql::dynamic::Schema;
    use docql_infra::{Document, DocumentStore, MemoryStore};
    use serde_json::json;

    /// Schema over `users { name, age }` with two seeded documents.
    pub(crate) async fn seeded_schema() -> Schema {
        let store = Arc::new(MemoryStore::new());
        for (id, name, age) in [("u1", "Ada", 36), ("u2", "Grace", 45)] {
            let data: Document = json!({ "name": name, "age": age }).as_object().cloned().unwrap();
            store.set("users", id, data).await.unwrap();
        }
        SchemaBuilder::new(store)
            .entity(EntityType::new(
                "User",
                "users",
                vec![
                    FieldDef::scalar("name", ScalarType::String),
                    FieldDef::scalar("age", ScalarType::Int),
                ],
            ))
            .finish()
            .unwrap()
    }

    #[test]
    fn anonymous_operation_is_found_without_a_name() {
        let ty = operation_type("subscription { userAdded { id } }", None).unwrap();

        assert_eq!(ty, Some(OperationType::Subscription));
    }

    #[test]
    fn named_operation_is_selected_by_name() {
        let document = "query List { users { id } } subscription Live { userAdded { id } }";

        assert_eq!(operation_type(document, Some("Live")).unwrap(), Some(OperationType::Subscription));
        assert_eq!(operation_type(document, Some("List")).unwrap(), Some(OperationType::Query));
        assert_eq!(operation_type(document, Some("Other")).unwrap(), None);
    }

    #[test]
    fn several_operations_without_a_name_are_ambiguous() {
        let document = "query List { users { id } } mutation Drop { deleteUser(id: \"u1\") { id } }";

        assert_eq!(operation_type(document, None).unwrap(), None);
    }

    #[test]
    fn single_named_operation_is_found_without_a_name() {
        let ty = operation_type("mutation Make { createUser(name: \"x\") { id } }", Some("")).unwrap();

        assert_eq!(ty, Some(OperationType::Mutation));
    }

    #[test]
    fn unparsable_documents_are_reported() {
        assert!(matches!(operation_type("subscription {", None), Err(LinkError::Parse(_))));
    }

    #[test]
    fn requests_carry_name_and_variables() {
        let variables = Variables::from_json(json!({ "id": "u1" }));
        let operation = Operation::new("query One($id: ID!) { user(id: $id) { id } }")
            .operation_name("One")
            .variables(variables.clone());

        let request = operation.to_request();

        assert_eq!(request.operation_name.as_deref(), Some("One"));
        assert_eq!(request.variables.into_value(), variables.into_value());
    }
}
