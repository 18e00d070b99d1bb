use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_graphql::dynamic::{FieldValue, SubscriptionField, SubscriptionFieldFuture, TypeRef};
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use docql_infra::{CollectionQuery, Document, DocumentStore, SnapshotSource, StoreResult, Subscription};

use super::entity::EntityType;
use super::error::ResultExt;
use super::types::Record;

/// One document affected by a live change, tagged with the subscription
/// operation it was produced for.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: String,
    pub document: Document,
}

impl ChangeEvent {
    /// `{ "<operation>": { ...document } }`
    pub fn payload(&self) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert(self.operation.clone(), Value::Object(self.document.clone()));
        Value::Object(payload)
    }
}

type PendingPull = oneshot::Sender<Option<ChangeEvent>>;

/// Pending pulls and undelivered values. At most one of the two queues is
/// non-empty at any time.
struct QueuePair {
    pulls: VecDeque<PendingPull>,
    values: VecDeque<ChangeEvent>,
    listening: bool,
    upstream: Option<Subscription>,
}

impl QueuePair {
    fn push_value(&mut self, mut event: ChangeEvent) {
        if !self.listening {
            return;
        }
        while let Some(pull) = self.pulls.pop_front() {
            match pull.send(Some(event)) {
                Ok(()) => return,
                // The puller went away; offer the value to the next one.
                Err(Some(returned)) => event = returned,
                Err(None) => return,
            }
        }
        self.values.push_back(event);
    }

    fn pull_value(&mut self) -> oneshot::Receiver<Option<ChangeEvent>> {
        let (tx, rx) = oneshot::channel();
        if !self.listening {
            let _ = tx.send(None);
        } else if let Some(event) = self.values.pop_front() {
            let _ = tx.send(Some(event));
        } else {
            self.pulls.push_back(tx);
        }
        rx
    }

    /// Resolve every pending pull as done and clear both queues. Returns the
    /// upstream registration the first time only.
    fn close(&mut self) -> Option<Subscription> {
        if !self.listening {
            return None;
        }
        self.listening = false;
        for pull in self.pulls.drain(..) {
            let _ = pull.send(None);
        }
        self.values.clear();
        self.upstream.take()
    }
}

fn close(shared: &Mutex<QueuePair>) {
    let upstream = shared.lock().close();
    if let Some(upstream) = upstream {
        upstream.unsubscribe();
    }
}

/// Result of one pull: the next event, or `None` once the stream is closed.
pub struct Pull {
    rx: oneshot::Receiver<Option<ChangeEvent>>,
}

impl Future for Pull {
    type Output = Option<ChangeEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| result.ok().flatten())
    }
}

/// Pull-based sequence of [`ChangeEvent`]s over a push-based snapshot source.
///
/// Every document of every upstream snapshot becomes one event, delivered in
/// upstream order. Closing (by [`ChangeStream::terminate`], [`ChangeStream::fail`],
/// an upstream error, or drop) releases the upstream registration once and
/// resolves every outstanding pull as done.
pub struct ChangeStream {
    shared: Arc<Mutex<QueuePair>>,
    in_flight: Option<Pull>,
}

impl ChangeStream {
    pub fn listen<S>(source: &S, query: CollectionQuery, operation: impl Into<String>) -> StoreResult<Self>
    where
        S: SnapshotSource + ?Sized,
    {
        let operation = operation.into();
        let shared = Arc::new(Mutex::new(QueuePair {
            pulls: VecDeque::new(),
            values: VecDeque::new(),
            listening: true,
            upstream: None,
        }));

        let sink = shared.clone();
        let upstream = source.listen(
            query,
            Box::new(move |snapshot| match snapshot {
                Ok(snapshots) => {
                    let mut queues = sink.lock();
                    for snapshot in snapshots {
                        queues.push_value(ChangeEvent {
                            operation: operation.clone(),
                            document: snapshot.into_document(),
                        });
                    }
                }
                Err(e) => {
                    tracing::error!(operation = %operation, "change stream upstream failed: {e}");
                    close(&sink);
                }
            }),
        )?;

        // An upstream failure during registration already closed the stream.
        let upstream = {
            let mut queues = shared.lock();
            if queues.listening {
                queues.upstream = Some(upstream);
                None
            } else {
                Some(upstream)
            }
        };
        if let Some(upstream) = upstream {
            upstream.unsubscribe();
        }

        Ok(Self {
            shared,
            in_flight: None,
        })
    }

    /// Request the next event. Several pulls may be outstanding; they resolve
    /// in the order they were issued.
    pub fn pull(&self) -> Pull {
        Pull {
            rx: self.shared.lock().pull_value(),
        }
    }

    /// Stop listening. Calling this more than once has no further effect.
    pub fn terminate(&self) {
        close(&self.shared);
    }

    /// Stop listening and hand `error` back to the caller.
    pub fn fail<E>(&self, error: E) -> Result<(), E> {
        self.terminate();
        Err(error)
    }

    pub fn is_listening(&self) -> bool {
        self.shared.lock().listening
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.in_flight.is_none() {
            this.in_flight = Some(this.pull());
        }
        let Some(pull) = this.in_flight.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(pull).poll(cx) {
            Poll::Ready(event) => {
                this.in_flight = None;
                Poll::Ready(event)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        close(&self.shared);
    }
}

/// `userAdded: User`
pub fn added_subscription_field(entity: &EntityType, store: Arc<dyn DocumentStore>) -> SubscriptionField {
    let operation = format!("{}Added", entity.singular_name());
    let collection = entity.collection().to_string();
    SubscriptionField::new(operation.clone(), TypeRef::named(entity.name()), move |_| {
        let store = store.clone();
        let operation = operation.clone();
        let collection = collection.clone();
        SubscriptionFieldFuture::new(async move {
            let stream = ChangeStream::listen(store.as_ref(), CollectionQuery::new(&collection), &operation)
                .gql_err("Failed to listen for changes")?;
            tracing::debug!(operation = %operation, collection = %collection, "subscription started");
            Ok(stream.map(move |event| {
                Ok::<FieldValue<'static>, async_graphql::Error>(
                    Record::new(collection.clone(), event.document).into_field_value(),
                )
            }))
        })
    })
    .description(format!("Documents of `{}` on every change", entity.name()))
}
