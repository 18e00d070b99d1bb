use async_graphql::dynamic::Schema;

use super::{Link, LinkError, Operation, ResultStream};

/// Runs operations against a local schema.
///
/// Execution starts when the returned stream is first polled and happens once
/// per stream. A clean result is one data event followed by completion; a
/// result with errors yields each error on its own and no data.
#[derive(Clone)]
pub struct ExecutionLink {
    schema: Schema,
}

impl ExecutionLink {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

impl Link for ExecutionLink {
    fn request(&self, operation: Operation) -> ResultStream {
        let schema = self.schema.clone();
        Box::pin(async_stream::stream! {
            let response = schema.execute(operation.to_request()).await;
            if response.errors.is_empty() {
                yield Ok(response);
            } else {
                tracing::debug!(errors = response.errors.len(), "operation failed");
                for error in response.errors {
                    yield Err(LinkError::Field(error));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::seeded_schema;
    use futures_util::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn clean_result_is_one_data_event_then_completion() {
        let link = ExecutionLink::new(seeded_schema().await);

        let events: Vec<_> = link
            .request(Operation::new("{ users(orderBy: [AGE_DESC]) { id } }"))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        let data = events[0].as_ref().unwrap().data.clone().into_json().unwrap();
        assert_eq!(data, json!({ "users": [{ "id": "u2" }, { "id": "u1" }] }));
    }

    #[tokio::test]
    async fn each_error_is_reported_separately_without_data() {
        let link = ExecutionLink::new(seeded_schema().await);

        let events: Vec<_> = link
            .request(Operation::new("{ missingOne missingTwo }"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| matches!(event, Err(LinkError::Field(_)))));
    }

    #[tokio::test]
    async fn not_found_surfaces_as_an_error_event() {
        let link = ExecutionLink::new(seeded_schema().await);

        let events: Vec<_> = link
            .request(Operation::new(r#"{ user(id: "nobody") { id } }"#))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(error) => assert_eq!(error.to_string(), "Document with nobody not found"),
            Ok(response) => panic!("expected an error, got {response:?}"),
        }
    }

    #[tokio::test]
    async fn nothing_runs_until_the_stream_is_polled() {
        let schema = seeded_schema().await;
        let link = ExecutionLink::new(schema.clone());

        let pending = link.request(Operation::new(r#"mutation { deleteUser(id: "u1") { id } }"#));
        let before = schema.execute("{ users { id } }").await.data.into_json().unwrap();
        drop(pending);

        assert_eq!(before, json!({ "users": [{ "id": "u1" }, { "id": "u2" }] }));
    }
}
