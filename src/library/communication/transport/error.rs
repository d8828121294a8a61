use crate::library::BoxedError;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Error shared between all callers awaiting the same connection attempt
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Failure of a broker interaction
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established
    #[error("unable to connect to the message broker")]
    ConnectionFailed(#[source] SharedError),
    /// Broker rejected or failed to process a publish call
    #[error("publishing to channel {channel} failed")]
    PublishFailed {
        /// Target channel
        channel: String,
        /// Underlying broker error
        #[source]
        source: BoxedError,
    },
    /// Broker rejected or failed to process a subscribe call
    #[error("subscribing to channel {channel} failed")]
    SubscribeFailed {
        /// Target channel
        channel: String,
        /// Underlying broker error
        #[source]
        source: BoxedError,
    },
    /// Broker rejected or failed to process an unsubscribe call
    #[error("unsubscribing from channel {channel} failed")]
    UnsubscribeFailed {
        /// Target channel
        channel: String,
        /// Underlying broker error
        #[source]
        source: BoxedError,
    },
    /// Only one subscriber per channel is permitted
    #[error("channel {0} already has a subscriber")]
    AlreadySubscribed(String),
    /// Connection was lost while waiting for messages
    #[error("subscription to channel {0} has been closed")]
    SubscriptionClosed(String),
}
