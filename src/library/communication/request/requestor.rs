use super::envelope::{query_channel, response_channel, QueryEnvelope, ResponseEnvelope};
use super::pending::{Outcome, PendingRequest};
use super::validator::{ResponseValidator, Typed};
use crate::library::communication::transport::{PubSubBackend, Transport, TransportError};
use crate::library::BoxedError;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Time to wait for a reply when no explicit timeout is given
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Error type for sending queries
#[derive(Error, Debug)]
pub enum QueryError {
    /// No reply arrived before the deadline
    #[error("no reply on {channel} within {timeout:?}")]
    Timeout {
        /// Reply channel that has been listened on
        channel: String,
        /// Time that has been waited
        timeout: Duration,
    },
    /// Reply is not a valid envelope or its content has been rejected by the validator
    #[error("reply could not be decoded")]
    Decode(#[source] BoxedError),
    /// Interaction with the broker failed
    #[error("message broker interaction failed")]
    Transport(#[from] TransportError),
    /// Query payload could not be serialized, nothing has been sent
    #[error("query could not be encoded")]
    Encode(#[source] serde_json::Error),
}

/// Sends queries and awaits their reply
///
/// Any number of queries may be in-flight concurrently, each one listens on its own
/// private reply channel of the shared [`Transport`].
pub struct Requestor<B: PubSubBackend> {
    transport: Arc<Transport<B>>,
}

impl<B: PubSubBackend> Clone for Requestor<B> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<B: PubSubBackend> Requestor<B> {
    /// Creates a new instance on top of a shared transport
    pub fn new(transport: Arc<Transport<B>>) -> Self {
        Self { transport }
    }

    /// Sends a query to the handler bound to `service` and `event` and waits for its reply
    ///
    /// Resolves exactly once: with the validated reply, or with an error if no reply arrives
    /// within `timeout` (defaults to [`DEFAULT_QUERY_TIMEOUT`]), the reply can not be decoded,
    /// or the broker can not be reached. The reply channel is released in every case, also
    /// when the returned future is dropped before completion.
    #[instrument(skip(self, payload, validator), fields(request_id = tracing::field::Empty))]
    pub async fn query<P, V>(
        &self,
        service: &str,
        event: &str,
        payload: &P,
        validator: &V,
        timeout: Option<Duration>,
    ) -> Result<V::Output, QueryError>
    where
        P: Serialize + ?Sized,
        V: ResponseValidator,
    {
        let timeout = timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT);

        self.transport.connect().await?;

        let request_id = Uuid::new_v4().to_string();
        let reply_channel = response_channel(service, &request_id);
        tracing::Span::current().record("request_id", request_id.as_str());

        let message = {
            let envelope = QueryEnvelope {
                data: payload,
                request_id,
                response_channel: reply_channel.clone(),
                date: Utc::now(),
                sequence: self.transport.next_sequence(),
            };

            serde_json::to_vec(&envelope).map_err(QueryError::Encode)?
        };

        let subscription = self.transport.subscribe(&reply_channel).await?;
        let mut pending = PendingRequest::new(self.transport.clone(), subscription);
        let deadline = Instant::now() + timeout;

        if let Err(error) = self
            .transport
            .publish(&query_channel(service, event), &message)
            .await
        {
            pending.settle().await;
            return Err(error.into());
        }

        trace!("Query sent, awaiting reply");
        let outcome = pending.outcome(deadline).await;
        pending.settle().await;

        match outcome {
            Outcome::Reply(payload) => {
                let envelope: ResponseEnvelope = serde_json::from_slice(&payload)
                    .map_err(|e| QueryError::Decode(e.into()))?;

                debug!(sequence = envelope.sequence, "Received reply");
                validator.validate(envelope.data).map_err(QueryError::Decode)
            }
            Outcome::TimedOut => {
                debug!(?timeout, "Query timed out");
                Err(QueryError::Timeout {
                    channel: reply_channel,
                    timeout,
                })
            }
            Outcome::Closed => Err(TransportError::SubscriptionClosed(reply_channel).into()),
        }
    }

    /// Shorthand for [`query`](Requestor::query) with a [`Typed`] validator
    pub async fn request<Req, Res>(
        &self,
        service: &str,
        event: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Res, QueryError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.query(service, event, request, &Typed::<Res>::new(), timeout)
            .await
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::implementation::memory::{MemoryBackend, MemoryBroker};
    use crate::library::communication::request::validator::validator_fn;
    use crate::library::communication::transport::Subscription;
    use futures::future::join_all;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn transport(broker: &MemoryBroker) -> Arc<Transport<MemoryBackend>> {
        Arc::new(Transport::new(broker.backend()))
    }

    /// Answers every query on the subscription by running `reply` on its data
    fn answer_with<F>(
        transport: Arc<Transport<MemoryBackend>>,
        mut queries: Subscription,
        reply: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(Value) -> Vec<u8> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(message) = queries.recv().await {
                let query: QueryEnvelope = serde_json::from_slice(&message).unwrap();
                transport
                    .publish(&query.response_channel, &reply(query.data))
                    .await
                    .unwrap();
            }
        })
    }

    fn envelope(data: Value) -> Vec<u8> {
        serde_json::to_vec(&ResponseEnvelope {
            data,
            date: Utc::now(),
            sequence: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolve_with_validated_reply() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let queries = responder.subscribe("query:math:double").await.unwrap();
        answer_with(responder.clone(), queries, |data| {
            envelope(json!(data.as_u64().unwrap() * 2))
        });

        let requestor = Requestor::new(transport(&broker));
        let result: u64 = requestor
            .request("math", "double", &21, None)
            .await
            .unwrap();

        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn time_out_without_responder() {
        let broker = MemoryBroker::new();
        let requestor = Requestor::new(transport(&broker));
        let timeout = Duration::from_millis(50);

        let start = Instant::now();
        let result = requestor
            .request::<_, Value>("nobody", "listening", &json!({}), Some(timeout))
            .await;

        assert!(start.elapsed() >= timeout);
        assert!(matches!(result, Err(QueryError::Timeout { timeout: t, .. }) if t == timeout));
    }

    #[tokio::test]
    async fn reject_malformed_reply() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let queries = responder.subscribe("query:broken:reply").await.unwrap();
        answer_with(responder.clone(), queries, |_| b"not json at all".to_vec());

        let requestor = Requestor::new(transport(&broker));
        let result = requestor
            .request::<_, Value>("broken", "reply", &json!({}), None)
            .await;

        assert!(matches!(result, Err(QueryError::Decode(_))));
    }

    #[tokio::test]
    async fn reject_invalid_reply() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let queries = responder.subscribe("query:math:double").await.unwrap();
        answer_with(responder.clone(), queries, |_| envelope(json!("forty-two")));

        let requestor = Requestor::new(transport(&broker));
        let validator = validator_fn(|data: Value| {
            data.as_u64().ok_or_else(|| BoxedError::from("not a number"))
        });
        let result = requestor
            .query("math", "double", &21, &validator, None)
            .await;

        assert!(matches!(result, Err(QueryError::Decode(_))));
    }

    #[tokio::test]
    async fn never_cross_deliver_concurrent_replies() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let queries = responder.subscribe("query:echo:back").await.unwrap();
        answer_with(responder.clone(), queries, envelope);

        let requestor = Requestor::new(transport(&broker));
        let results = join_all((0..50u64).map(|i| {
            let requestor = requestor.clone();
            async move { requestor.request::<_, u64>("echo", "back", &i, None).await }
        }))
        .await;

        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), i as u64);
        }
    }

    #[tokio::test]
    async fn release_reply_channel_after_settlement() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let queries = responder.subscribe("query:echo:back").await.unwrap();
        answer_with(responder.clone(), queries, envelope);

        let local = transport(&broker);
        let requestor = Requestor::new(local.clone());

        requestor
            .request::<_, u64>("echo", "back", &1, None)
            .await
            .unwrap();

        for _ in 0..10 {
            requestor
                .request::<_, Value>("nobody", "listening", &1, Some(Duration::from_millis(5)))
                .await
                .unwrap_err();
        }

        assert_eq!(local.subscription_count(), 0);
        // Only the responder's query channel remains
        assert_eq!(broker.subscription_count(), 1);
    }

    #[tokio::test]
    async fn ignore_late_replies() {
        let broker = MemoryBroker::new();
        let responder = transport(&broker);
        let mut queries = responder.subscribe("query:slow:reply").await.unwrap();

        let requestor = Requestor::new(transport(&broker));
        let result = requestor
            .request::<_, Value>("slow", "reply", &1, Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(QueryError::Timeout { .. })));

        let query: QueryEnvelope = serde_json::from_slice(&queries.recv().await.unwrap()).unwrap();
        responder
            .publish(&query.response_channel, &envelope(json!(1)))
            .await
            .unwrap();

        // The next query is unaffected by the stray reply
        let result = requestor
            .request::<_, Value>("slow", "reply", &2, Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(QueryError::Timeout { .. })));
    }

    #[tokio::test]
    async fn report_unreachable_broker() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);

        let requestor = Requestor::new(transport(&broker));
        let result = requestor
            .request::<_, Value>("auth", "check-file-access", &1, None)
            .await;

        assert!(matches!(result, Err(QueryError::Transport(_))));
    }

    #[tokio::test]
    async fn report_unencodable_payload() {
        let broker = MemoryBroker::new();
        let local = transport(&broker);
        let requestor = Requestor::new(local.clone());

        let mut payload = std::collections::HashMap::new();
        payload.insert(vec![1u8], "keys must be strings");

        let result = requestor
            .request::<_, Value>("auth", "check-file-access", &payload, None)
            .await;

        assert!(matches!(result, Err(QueryError::Encode(_))));
        assert_eq!(local.subscription_count(), 0);
    }

    #[tokio::test]
    async fn release_reply_channel_when_abandoned() {
        let broker = MemoryBroker::new();
        let local = transport(&broker);
        let requestor = Requestor::new(local.clone());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            requestor.request::<_, Value>("nobody", "listening", &1, Some(Duration::from_secs(10))),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(local.subscription_count(), 0);
    }
}
