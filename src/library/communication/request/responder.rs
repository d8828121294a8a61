use super::envelope::{query_channel, QueryEnvelope, ResponseEnvelope};
use crate::library::communication::transport::{PubSubBackend, Subscription, Transport, TransportError};
use crate::library::BoxedError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Future;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn, Instrument};

/// Error that may be thrown while responding to a request
#[derive(Error, Debug)]
pub enum ResponderError {
    /// Inbound message is not a valid query envelope
    #[error("malformed query envelope")]
    MalformedQuery(#[source] serde_json::Error),
    /// Query data does not match what the handler expects
    #[error("invalid request data")]
    InvalidRequest(#[source] BoxedError),
    /// The handler threw an error
    #[error("processing request failed")]
    ProcessingFailed(#[source] BoxedError),
    /// The handler result could not be serialized, no reply has been sent
    #[error("encoding response failed")]
    ResponseEncoding(#[source] BoxedError),
    /// Unable to deliver the response
    #[error("sending response failed")]
    ResponseUndeliverable(#[source] TransportError),
}

/// Query as seen by a handler
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// Request payload
    pub data: Value,
    /// Identifier assigned by the requestor
    pub request_id: String,
    /// Time at which the requestor sent the query
    pub date: DateTime<Utc>,
    /// Channel the reply will be sent to
    pub response_channel: String,
}

impl From<QueryEnvelope> for InboundRequest {
    fn from(envelope: QueryEnvelope) -> Self {
        Self {
            data: envelope.data,
            request_id: envelope.request_id,
            date: envelope.date,
            response_channel: envelope.response_channel,
        }
    }
}

/// Untyped handler bound to a query channel
///
/// Every inbound request is handled independently, possibly concurrently to other requests
/// on the same binding.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produces the reply data for a request
    async fn handle(&self, request: InboundRequest) -> Result<Value, ResponderError>;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn handle(&self, request: InboundRequest) -> Result<Value, ResponderError> {
        (**self).handle(request).await
    }
}

/// Structure which processes typed requests and produces typed responses
#[async_trait]
pub trait RequestProcessor: Send + Sync + 'static {
    /// Type of request to process
    type Request: DeserializeOwned + Send;
    /// Type of response produced
    type Response: Serialize + Send;

    /// Handler for requests, returning a response
    async fn process(&self, request: Self::Request) -> Result<Self::Response, BoxedError>;
}

/// Adapter turning a [`RequestProcessor`] into a [`RequestHandler`]
pub struct Processor<P>(pub P);

#[async_trait]
impl<P: RequestProcessor> RequestHandler for Processor<P> {
    async fn handle(&self, request: InboundRequest) -> Result<Value, ResponderError> {
        let request = serde_json::from_value(request.data)
            .map_err(|e| ResponderError::InvalidRequest(e.into()))?;

        let response = self
            .0
            .process(request)
            .await
            .map_err(ResponderError::ProcessingFailed)?;

        serde_json::to_value(response).map_err(|e| ResponderError::ResponseEncoding(e.into()))
    }
}

/// Handler backed by an async closure, created through [`handler_fn`]
pub struct HandlerFn<F> {
    handler: F,
}

/// Wraps an async closure into a [`RequestHandler`]
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn<F>
where
    F: Fn(InboundRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxedError>> + Send,
{
    HandlerFn { handler }
}

#[async_trait]
impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(InboundRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxedError>> + Send,
{
    async fn handle(&self, request: InboundRequest) -> Result<Value, ResponderError> {
        (self.handler)(request)
            .await
            .map_err(ResponderError::ProcessingFailed)
    }
}

/// Running handler binding
///
/// The binding stays active when this value is dropped. Use
/// [`ResponderRegistry::unregister`] to remove it.
pub struct Listener {
    channel: String,
    task: JoinHandle<()>,
}

impl Listener {
    /// Query channel the handler is bound to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits until the listener has stopped receiving queries, either because it has been
    /// unregistered or because the broker connection has been lost
    pub async fn stopped(&mut self) {
        if let Err(error) = (&mut self.task).await {
            warn!(?error, channel = %self.channel, "Listener task failed");
        }
    }
}

/// Active bindings keyed by query channel, valued by the generation that created them
type Bindings = Arc<Mutex<HashMap<String, u64>>>;

fn lock(bindings: &Bindings) -> MutexGuard<'_, HashMap<String, u64>> {
    bindings.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binds handlers to query channels and replies on their behalf
///
/// A binding is dropped when its listener stops, be it through [`unregister`](Self::unregister)
/// or because the broker connection has been lost.
pub struct ResponderRegistry<B: PubSubBackend> {
    transport: Arc<Transport<B>>,
    bindings: Bindings,
    generation: AtomicU64,
}

impl<B: PubSubBackend> ResponderRegistry<B> {
    /// Creates a new registry without any bindings
    pub fn new(transport: Arc<Transport<B>>) -> Self {
        Self {
            transport,
            bindings: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of active bindings
    pub fn binding_count(&self) -> usize {
        lock(&self.bindings).len()
    }

    /// Starts answering queries for `event` on `service` with the given handler
    ///
    /// Each inbound query is processed on its own task. Failures are logged and only
    /// affect the query that caused them.
    #[instrument(skip(self, handler))]
    pub async fn register_handler<H: RequestHandler>(
        &self,
        service: &str,
        event: &str,
        handler: H,
    ) -> Result<Listener, TransportError> {
        let channel = query_channel(service, event);
        let subscription = self.transport.subscribe(&channel).await?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        lock(&self.bindings).insert(channel.clone(), generation);
        debug!(generation, "Handler registered");

        let task = tokio::spawn(
            Self::listen(
                self.transport.clone(),
                subscription,
                Arc::new(handler),
                self.bindings.clone(),
                generation,
            )
            .in_current_span(),
        );

        Ok(Listener { channel, task })
    }

    /// Removes a binding, doing nothing if it does not exist
    #[instrument(skip(self))]
    pub async fn unregister(&self, service: &str, event: &str) -> Result<(), TransportError> {
        let channel = query_channel(service, event);

        if lock(&self.bindings).remove(&channel).is_none() {
            return Ok(());
        }

        debug!("Removing handler");
        self.transport.unsubscribe(&channel).await
    }

    async fn listen<H: RequestHandler>(
        transport: Arc<Transport<B>>,
        mut subscription: Subscription,
        handler: Arc<H>,
        bindings: Bindings,
        generation: u64,
    ) {
        while let Some(message) = subscription.recv().await {
            let transport = transport.clone();
            let handler = handler.clone();

            tokio::spawn(
                async move {
                    if let Err(error) = Self::respond(&transport, handler.as_ref(), &message).await {
                        warn!(?error, "Failed to answer query");
                    }
                }
                .in_current_span(),
            );
        }

        {
            let mut active = lock(&bindings);
            if active.get(subscription.channel()) == Some(&generation) {
                active.remove(subscription.channel());
            }
        }

        debug!("Listener stopped");
    }

    async fn respond<H: RequestHandler>(
        transport: &Transport<B>,
        handler: &H,
        message: &[u8],
    ) -> Result<(), ResponderError> {
        let envelope: QueryEnvelope =
            serde_json::from_slice(message).map_err(ResponderError::MalformedQuery)?;
        let response_channel = envelope.response_channel.clone();

        trace!(request_id = %envelope.request_id, sequence = envelope.sequence, "Handling query");
        let data = handler.handle(envelope.into()).await?;

        let reply = ResponseEnvelope {
            data,
            date: Utc::now(),
            sequence: transport.next_sequence(),
        };

        let payload =
            serde_json::to_vec(&reply).map_err(|e| ResponderError::ResponseEncoding(e.into()))?;

        transport
            .publish(&response_channel, &payload)
            .await
            .map_err(ResponderError::ResponseUndeliverable)
    }
}
