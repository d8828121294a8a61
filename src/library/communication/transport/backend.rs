use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Message as delivered by a broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Unaltered message body
    pub payload: Vec<u8>,
}

impl RawMessage {
    /// Creates a new instance from raw parts
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Raw access to a publish/subscribe broker
///
/// Implementations own one logical connection for publishing and one for subscribing.
/// They do not need to guard against redundant calls to [`connect`](PubSubBackend::connect),
/// the [`Transport`](super::Transport) on top makes sure it is only called when no
/// connection exists or is being established.
#[async_trait]
pub trait PubSubBackend: Send + Sync + 'static {
    /// Opens the connection pair and returns the stream of messages received
    /// on all channels subscribed to through [`subscribe_raw`](PubSubBackend::subscribe_raw).
    ///
    /// The stream ending is interpreted as the connection being lost.
    async fn connect(&self) -> Result<BoxStream<'static, RawMessage>, BoxedError>;

    /// Sends a message to all current subscribers of a channel without awaiting any confirmation
    async fn publish_raw(&self, channel: &str, payload: &[u8]) -> EmptyResult;

    /// Starts receiving messages for the given channel
    async fn subscribe_raw(&self, channel: &str) -> EmptyResult;

    /// Stops receiving messages for the given channel
    async fn unsubscribe_raw(&self, channel: &str) -> EmptyResult;
}
