use crate::library::communication::transport::{PubSubBackend, Subscription, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::{trace, warn};

/// First event observed by a [`PendingRequest`]
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    /// A message arrived on the reply channel
    Reply(Vec<u8>),
    /// The deadline passed without a reply
    TimedOut,
    /// The subscription has been closed, usually due to a lost broker connection
    Closed,
}

/// Outstanding query waiting for its one reply
///
/// Owns the subscription of the private reply channel. The subscription is released
/// exactly once, either explicitly through [`settle`](PendingRequest::settle) or when the
/// request is dropped without having been settled.
pub(super) struct PendingRequest<B: PubSubBackend> {
    transport: Arc<Transport<B>>,
    subscription: Subscription,
    settled: AtomicBool,
}

impl<B: PubSubBackend> PendingRequest<B> {
    pub fn new(transport: Arc<Transport<B>>, subscription: Subscription) -> Self {
        Self {
            transport,
            subscription,
            settled: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &str {
        self.subscription.channel()
    }

    /// Waits for whichever comes first, a reply or the deadline
    pub async fn outcome(&mut self, deadline: Instant) -> Outcome {
        tokio::select! {
            biased;

            message = self.subscription.recv() => match message {
                Some(payload) => Outcome::Reply(payload),
                None => Outcome::Closed,
            },
            _ = sleep_until(deadline) => Outcome::TimedOut,
        }
    }

    /// Releases the reply channel, returns false if the request has already been settled
    pub async fn settle(&self) -> bool {
        if self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        trace!(channel = self.channel(), "Settling request");

        if let Err(error) = self.transport.unsubscribe(self.channel()).await {
            warn!(?error, channel = self.channel(), "Failed to release reply channel");
        }

        true
    }
}

impl<B: PubSubBackend> Drop for PendingRequest<B> {
    fn drop(&mut self) {
        if !*self.settled.get_mut() {
            trace!(channel = self.channel(), "Releasing reply channel of abandoned request");
            self.transport
                .unsubscribe_detached(self.subscription.channel().to_owned());
        }
    }
}
