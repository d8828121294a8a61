use super::{RawMessage, TransportError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Receiving end of a channel subscription
///
/// Yields message payloads in the order they are delivered by the broker. Once the
/// subscription has been removed from its [`Transport`](super::Transport) or the broker
/// connection has been lost, [`recv`](Subscription::recv) returns `None`.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    /// Name of the subscribed channel
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message payload
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// Mapping from channel name to the one subscriber of said channel
///
/// Insertion, removal and dispatch all take the same lock so a message can not be
/// delivered to a subscription that has already been removed.
#[derive(Default)]
pub(super) struct SubscriptionTable {
    entries: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl SubscriptionTable {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Vec<u8>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, channel: &str) -> Result<Subscription, TransportError> {
        let mut entries = self.entries();

        if entries.contains_key(channel) {
            return Err(TransportError::AlreadySubscribed(channel.to_owned()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        entries.insert(channel.to_owned(), tx);

        Ok(Subscription {
            channel: channel.to_owned(),
            rx,
        })
    }

    /// Returns whether an entry existed
    pub fn remove(&self, channel: &str) -> bool {
        self.entries().remove(channel).is_some()
    }

    /// Returns whether the message has been handed to a subscriber
    pub fn dispatch(&self, message: RawMessage) -> bool {
        let entries = self.entries();

        match entries.get(&message.channel) {
            Some(tx) => tx.send(message.payload).is_ok(),
            None => {
                trace!(channel = %message.channel, "Dropping message for channel without subscriber");
                false
            }
        }
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[tokio::test]
    async fn deliver_to_subscriber() {
        let table = SubscriptionTable::default();
        let mut subscription = table.insert("some-channel").unwrap();

        assert!(table.dispatch(RawMessage::new("some-channel", b"hello".to_vec())));
        assert_eq!(subscription.recv().await, Some(b"hello".to_vec()));
    }

    #[test]
    fn reject_second_subscriber() {
        let table = SubscriptionTable::default();
        let _subscription = table.insert("some-channel").unwrap();

        assert!(matches!(
            table.insert("some-channel"),
            Err(TransportError::AlreadySubscribed(channel)) if channel == "some-channel"
        ));
    }

    #[tokio::test]
    async fn drop_messages_after_removal() {
        let table = SubscriptionTable::default();
        let mut subscription = table.insert("some-channel").unwrap();

        assert!(table.remove("some-channel"));
        assert!(!table.remove("some-channel"));
        assert!(!table.dispatch(RawMessage::new("some-channel", b"late".to_vec())));
        assert_eq!(subscription.recv().await, None);
    }

    #[tokio::test]
    async fn close_subscriptions_on_clear() {
        let table = SubscriptionTable::default();
        let mut first = table.insert("first").unwrap();
        let mut second = table.insert("second").unwrap();

        table.clear();

        assert_eq!(table.len(), 0);
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, None);
    }
}
