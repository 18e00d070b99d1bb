use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::parser::types::OperationType;
use futures_util::StreamExt;

use super::{operation_type, Link, Operation, ResultStream};

/// Routes subscription operations to the schema's live stream and passes
/// everything else to `next` as received.
pub struct SubscriptionLink {
    schema: Schema,
    next: Arc<dyn Link>,
}

impl SubscriptionLink {
    pub fn new(schema: Schema, next: Arc<dyn Link>) -> Self {
        Self { schema, next }
    }
}

impl Link for SubscriptionLink {
    fn request(&self, operation: Operation) -> ResultStream {
        match operation_type(&operation.query, operation.operation_name.as_deref()) {
            Ok(Some(OperationType::Subscription)) => {}
            Ok(_) => return self.next.request(operation),
            Err(e) => {
                // Reporting malformed documents is the next link's job.
                tracing::debug!("forwarding unparsed operation: {e}");
                return self.next.request(operation);
            }
        }

        let schema = self.schema.clone();
        Box::pin(async_stream::stream! {
            let responses = schema.execute_stream(operation.to_request());
            futures_util::pin_mut!(responses);
            while let Some(response) = responses.next().await {
                yield Ok(response);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::seeded_schema;
    use crate::transport::{ExecutionLink, LinkError};
    use async_graphql::Variables;
    use futures_util::stream;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records what it receives and answers with an empty stream.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Operation>>,
    }

    impl Link for Recorder {
        fn request(&self, operation: Operation) -> ResultStream {
            self.seen.lock().push(operation);
            Box::pin(stream::empty::<Result<async_graphql::Response, LinkError>>())
        }
    }

    #[tokio::test]
    async fn non_subscriptions_are_forwarded_untouched() {
        let recorder = Arc::new(Recorder::default());
        let link = SubscriptionLink::new(seeded_schema().await, recorder.clone());
        let operation = Operation::new("query One($id: ID!) { user(id: $id) { id } }")
            .variables(Variables::from_json(json!({ "id": "u1" })));

        let events: Vec<_> = link.request(operation.clone()).collect().await;

        assert!(events.is_empty());
        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(Arc::ptr_eq(&seen[0].query, &operation.query));
        assert!(Arc::ptr_eq(&seen[0].variables, &operation.variables));
    }

    #[tokio::test]
    async fn unparsable_documents_are_forwarded() {
        let recorder = Arc::new(Recorder::default());
        let link = SubscriptionLink::new(seeded_schema().await, recorder.clone());

        let _ = link.request(Operation::new("subscription {")).collect::<Vec<_>>().await;

        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn subscriptions_stream_every_change_event() {
        let schema = seeded_schema().await;
        let link = SubscriptionLink::new(schema.clone(), Arc::new(ExecutionLink::new(schema)));

        let mut events = link.request(Operation::new("subscription { userAdded { id name } }"));

        let mut seen = Vec::new();
        for _ in 0..2 {
            let response = events.next().await.unwrap().unwrap();
            assert!(response.errors.is_empty(), "{:?}", response.errors);
            seen.push(response.data.into_json().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                json!({ "userAdded": { "id": "u1", "name": "Ada" } }),
                json!({ "userAdded": { "id": "u2", "name": "Grace" } }),
            ]
        );
    }

    #[tokio::test]
    async fn queries_reach_the_execution_link() {
        let schema = seeded_schema().await;
        let link = SubscriptionLink::new(schema.clone(), Arc::new(ExecutionLink::new(schema)));

        let events: Vec<_> = link
            .request(Operation::new(r#"{ user(id: "u2") { name age } }"#))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        let data = events[0].as_ref().unwrap().data.clone().into_json().unwrap();
        assert_eq!(data, json!({ "user": { "name": "Grace", "age": 45 } }));
    }
}
