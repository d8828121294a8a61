//! Broker agnostic publish/subscribe transport
//!
//! The [`Transport`] wraps a [`PubSubBackend`] and adds the guarantees the layers above rely on:
//!
//! - The connection is established lazily and exactly once, concurrent first callers all
//!   await the same in-flight attempt instead of opening additional connections.
//! - Every channel has at most one local subscriber. Incoming messages are routed to it
//!   through a table whose insert, remove, and lookup operations are mutually atomic.
//! - A process-local sequence counter is handed out to everyone sending envelopes.

mod backend;
mod error;
mod subscription;

pub use backend::{PubSubBackend, RawMessage};
pub use error::{SharedError, TransportError};
pub use subscription::Subscription;

use futures::future::{BoxFuture, Shared};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subscription::SubscriptionTable;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

type ConnectionAttempt = Shared<BoxFuture<'static, Result<(), SharedError>>>;

enum ConnectionState {
    Disconnected,
    Connecting(ConnectionAttempt),
    Connected,
}

/// Observable state of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection exists, the next operation will attempt to establish one
    Disconnected,
    /// A connection attempt is in-flight
    Connecting,
    /// Connection is established and incoming messages are dispatched
    Connected,
}

/// Publish/subscribe transport with lazy connection handling and local subscription routing
pub struct Transport<B: PubSubBackend> {
    backend: Arc<B>,
    state: Arc<Mutex<ConnectionState>>,
    subscriptions: Arc<SubscriptionTable>,
    sequence: AtomicU64,
}

impl<B: PubSubBackend> Transport<B> {
    /// Creates a new, not yet connected instance
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            subscriptions: Arc::new(SubscriptionTable::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Underlying broker binding
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current state of the broker connection
    pub async fn status(&self) -> ConnectionStatus {
        match *self.state.lock().await {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting(_) => ConnectionStatus::Connecting,
            ConnectionState::Connected => ConnectionStatus::Connected,
        }
    }

    /// Number of channels that currently have a local subscriber
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Hands out the next value of the process-local message counter
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Establishes the broker connection unless it already exists
    ///
    /// Safe to call redundantly and concurrently. Callers arriving while a connection
    /// attempt is in-flight await the outcome of that attempt. A failed attempt resets
    /// the transport so that the next call tries again.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<(), TransportError> {
        let attempt = {
            let mut state = self.state.lock().await;

            match &*state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting(attempt) => {
                    trace!("Awaiting in-flight connection attempt");
                    attempt.clone()
                }
                ConnectionState::Disconnected => {
                    debug!("Connecting to message broker");
                    let attempt = Self::establish(
                        self.backend.clone(),
                        self.state.clone(),
                        self.subscriptions.clone(),
                    )
                    .boxed()
                    .shared();

                    *state = ConnectionState::Connecting(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await.map_err(TransportError::ConnectionFailed)
    }

    /// Sends a message without waiting for it to be delivered
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.connect().await?;

        trace!("Publishing message");
        self.backend
            .publish_raw(channel, payload)
            .await
            .map_err(|source| TransportError::PublishFailed {
                channel: channel.to_owned(),
                source,
            })
    }

    /// Registers the one local subscriber of a channel
    ///
    /// The subscription is routable before the broker is told about it so no message
    /// published after this call returns can be missed.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        self.connect().await?;

        let subscription = self.subscriptions.insert(channel)?;

        if let Err(source) = self.backend.subscribe_raw(channel).await {
            self.subscriptions.remove(channel);

            return Err(TransportError::SubscribeFailed {
                channel: channel.to_owned(),
                source,
            });
        }

        trace!("Subscribed");
        Ok(subscription)
    }

    /// Removes the subscriber of a channel, doing nothing if there is none
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        if !self.subscriptions.remove(channel) {
            trace!("No subscription to remove");
            return Ok(());
        }

        self.backend
            .unsubscribe_raw(channel)
            .await
            .map_err(|source| TransportError::UnsubscribeFailed {
                channel: channel.to_owned(),
                source,
            })
    }

    /// Same as [`unsubscribe`](Transport::unsubscribe) but usable from synchronous contexts like [`Drop`].
    ///
    /// The local subscriber is removed immediately, the broker is notified on a background task.
    pub fn unsubscribe_detached(&self, channel: String) {
        if !self.subscriptions.remove(&channel) {
            return;
        }

        let backend = self.backend.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = backend.unsubscribe_raw(&channel).await {
                        warn!(?error, %channel, "Failed to unsubscribe in background");
                    }
                });
            }
            Err(_) => warn!(%channel, "No runtime available to unsubscribe from broker"),
        }
    }

    async fn establish(
        backend: Arc<B>,
        state: Arc<Mutex<ConnectionState>>,
        subscriptions: Arc<SubscriptionTable>,
    ) -> Result<(), SharedError> {
        match backend.connect().await {
            Ok(messages) => {
                *state.lock().await = ConnectionState::Connected;
                tokio::spawn(Self::dispatch(messages, state, subscriptions));
                debug!("Connected to message broker");
                Ok(())
            }
            Err(error) => {
                warn!(?error, "Failed to connect to message broker");
                *state.lock().await = ConnectionState::Disconnected;
                Err(SharedError::from(error))
            }
        }
    }

    async fn dispatch(
        mut messages: BoxStream<'static, RawMessage>,
        state: Arc<Mutex<ConnectionState>>,
        subscriptions: Arc<SubscriptionTable>,
    ) {
        while let Some(message) = messages.next().await {
            subscriptions.dispatch(message);
        }

        warn!("Message broker connection lost, closing all subscriptions");

        let mut state = state.lock().await;
        subscriptions.clear();
        *state = ConnectionState::Disconnected;
    }
}
