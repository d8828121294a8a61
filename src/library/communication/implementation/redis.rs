//! Trait implementations using [`redis`](::redis)

use crate::library::communication::transport::{PubSubBackend, RawMessage};
use crate::library::{BoxedError, EmptyResult};
use ::redis::aio::{MultiplexedConnection, PubSubSink};
use ::redis::{AsyncCommands, Client, Msg, RedisResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, trace};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// Errors specific to the redis binding
#[derive(Error, Debug)]
pub enum RedisBackendError {
    /// An operation was attempted before [`connect`](PubSubBackend::connect) succeeded
    #[error("not connected to redis")]
    NotConnected,
    /// The server did not accept the connection in time
    #[error("timed out connecting to redis")]
    ConnectTimeout,
}

struct RedisConnections {
    publisher: MultiplexedConnection,
    subscriber: PubSubSink,
}

/// [`PubSubBackend`] implementation using [Redis Pub/Sub](https://redis.io/topics/pubsub)
///
/// - Messages are sent with [`PUBLISH`](https://redis.io/commands/publish) over a multiplexed connection
/// - Subscriptions are managed with [`SUBSCRIBE`](https://redis.io/commands/subscribe) and
///   [`UNSUBSCRIBE`](https://redis.io/commands/unsubscribe) over a dedicated connection in pub/sub mode
pub struct RedisBackend {
    client: Client,
    connections: Mutex<Option<RedisConnections>>,
}

impl RedisBackend {
    /// Creates a new, not yet connected instance for the given server URL
    pub fn new(url: &str) -> RedisResult<Self> {
        Ok(Self {
            client: Client::open(url)?,
            connections: Mutex::new(None),
        })
    }

    async fn publisher(&self) -> Result<MultiplexedConnection, RedisBackendError> {
        self.connections
            .lock()
            .await
            .as_ref()
            .map(|connections| connections.publisher.clone())
            .ok_or(RedisBackendError::NotConnected)
    }
}

fn into_raw_message(message: Msg) -> RawMessage {
    RawMessage::new(
        message.get_channel_name(),
        message.get_payload_bytes().to_vec(),
    )
}

#[async_trait]
impl PubSubBackend for RedisBackend {
    #[instrument(skip(self))]
    async fn connect(&self) -> Result<BoxStream<'static, RawMessage>, BoxedError> {
        debug!("Opening redis connections");

        let publisher = timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| RedisBackendError::ConnectTimeout)??;

        let pubsub = timeout(CONNECT_TIMEOUT, self.client.get_async_pubsub())
            .await
            .map_err(|_| RedisBackendError::ConnectTimeout)??;

        let (subscriber, messages) = pubsub.split();

        *self.connections.lock().await = Some(RedisConnections {
            publisher,
            subscriber,
        });

        Ok(messages.map(into_raw_message).boxed())
    }

    async fn publish_raw(&self, channel: &str, payload: &[u8]) -> EmptyResult {
        let mut con = self.publisher().await?;

        trace!(channel, "Redis PUBLISH");
        con.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    async fn subscribe_raw(&self, channel: &str) -> EmptyResult {
        let mut connections = self.connections.lock().await;
        let connections = connections
            .as_mut()
            .ok_or(RedisBackendError::NotConnected)?;

        trace!(channel, "Redis SUBSCRIBE");
        connections.subscriber.subscribe(channel).await?;

        Ok(())
    }

    async fn unsubscribe_raw(&self, channel: &str) -> EmptyResult {
        let mut connections = self.connections.lock().await;
        let connections = connections
            .as_mut()
            .ok_or(RedisBackendError::NotConnected)?;

        trace!(channel, "Redis UNSUBSCRIBE");
        connections.subscriber.unsubscribe(channel).await?;

        Ok(())
    }
}
