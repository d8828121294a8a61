//! Process-local broker
//!
//! Behaves like a real broker from the perspective of a [`Transport`](super::super::transport::Transport):
//! every [`MemoryBackend`] is an independent client with its own channel subscriptions and
//! message stream. Used for tests and for running all modules within a single process.

use crate::library::communication::transport::{PubSubBackend, RawMessage};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// Errors returned by the in-memory broker
#[derive(Error, Debug)]
pub enum MemoryBrokerError {
    /// The broker has been made unreachable through [`MemoryBroker::set_reachable`]
    #[error("broker is unreachable")]
    Unreachable,
    /// The client has not connected yet or has been disconnected
    #[error("client is not connected")]
    NotConnected,
}

struct Client {
    channels: HashSet<String>,
    tx: mpsc::UnboundedSender<RawMessage>,
}

#[derive(Default)]
struct BrokerState {
    clients: Mutex<HashMap<usize, Client>>,
    next_client: AtomicUsize,
    connections: AtomicUsize,
    unreachable: AtomicBool,
}

/// Broker that delivers messages between clients within the same process
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Creates a new broker without any clients
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, not yet connected client
    pub fn backend(&self) -> MemoryBackend {
        MemoryBackend {
            broker: self.clone(),
            id: self.state.next_client.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Toggles whether connecting and publishing succeeds
    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Total number of connections opened since the broker was created
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of channel subscriptions summed over all connected clients
    pub fn subscription_count(&self) -> usize {
        self.clients()
            .values()
            .map(|client| client.channels.len())
            .sum()
    }

    /// Drops all client connections, ending their message streams
    pub fn disconnect_all(&self) {
        self.clients().clear();
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<usize, Client>> {
        self.state
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_reachable(&self) -> Result<(), MemoryBrokerError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            Err(MemoryBrokerError::Unreachable)
        } else {
            Ok(())
        }
    }

    fn deliver(&self, channel: &str, payload: &[u8]) -> usize {
        let clients = self.clients();
        let mut receivers = 0;

        for client in clients.values() {
            if client.channels.contains(channel)
                && client.tx.send(RawMessage::new(channel, payload)).is_ok()
            {
                receivers += 1;
            }
        }

        receivers
    }
}

/// Client connection to a [`MemoryBroker`]
pub struct MemoryBackend {
    broker: MemoryBroker,
    id: usize,
}

#[async_trait]
impl PubSubBackend for MemoryBackend {
    async fn connect(&self) -> Result<BoxStream<'static, RawMessage>, BoxedError> {
        self.broker.ensure_reachable()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client {
            channels: HashSet::new(),
            tx,
        };

        self.broker.clients().insert(self.id, client);
        self.broker.state.connections.fetch_add(1, Ordering::SeqCst);

        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });

        Ok(messages.boxed())
    }

    async fn publish_raw(&self, channel: &str, payload: &[u8]) -> EmptyResult {
        self.broker.ensure_reachable()?;

        let receivers = self.broker.deliver(channel, payload);
        trace!(channel, receivers, "Delivered message");

        Ok(())
    }

    async fn subscribe_raw(&self, channel: &str) -> EmptyResult {
        match self.broker.clients().get_mut(&self.id) {
            Some(client) => {
                client.channels.insert(channel.to_owned());
                Ok(())
            }
            None => Err(MemoryBrokerError::NotConnected.into()),
        }
    }

    async fn unsubscribe_raw(&self, channel: &str) -> EmptyResult {
        if let Some(client) = self.broker.clients().get_mut(&self.id) {
            client.channels.remove(channel);
        }

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[tokio::test]
    async fn deliver_only_to_subscribed_clients() {
        let broker = MemoryBroker::new();
        let subscribed = broker.backend();
        let bystander = broker.backend();

        let mut messages = subscribed.connect().await.unwrap();
        let _other_messages = bystander.connect().await.unwrap();
        subscribed.subscribe_raw("news").await.unwrap();

        assert_eq!(broker.deliver("news", b"extra"), 1);
        assert_eq!(broker.deliver("weather", b"sunny"), 0);
        assert_eq!(
            messages.next().await,
            Some(RawMessage::new("news", b"extra".to_vec()))
        );
    }

    #[tokio::test]
    async fn refuse_subscriptions_before_connecting() {
        let broker = MemoryBroker::new();
        let backend = broker.backend();

        assert!(backend.subscribe_raw("news").await.is_err());
    }

    #[tokio::test]
    async fn refuse_operations_while_unreachable() {
        let broker = MemoryBroker::new();
        let backend = broker.backend();

        broker.set_reachable(false);

        assert!(backend.connect().await.is_err());
        assert!(backend.publish_raw("news", b"extra").await.is_err());
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn end_streams_on_disconnect() {
        let broker = MemoryBroker::new();
        let backend = broker.backend();

        let mut messages = backend.connect().await.unwrap();
        backend.subscribe_raw("news").await.unwrap();
        broker.disconnect_all();

        assert_eq!(messages.next().await, None);
        assert_eq!(broker.subscription_count(), 0);
    }
}
