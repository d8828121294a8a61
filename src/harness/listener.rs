use crate::library::communication::request::{query_channel, RequestHandler, ResponderRegistry};
use crate::library::communication::transport::PubSubBackend;
use crate::library::EmptyResult;
use async_trait::async_trait;
use jatsl::{Job, JobManager};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by a [`ListenerJob`]
#[derive(Error, Debug)]
pub enum ListenerJobError {
    /// The listener stopped while the job was still supposed to be running
    #[error("listener on {0} stopped unexpectedly")]
    Stopped(String),
}

/// Job which keeps a handler bound to a query channel until it is terminated
pub struct ListenerJob<B: PubSubBackend> {
    registry: Arc<ResponderRegistry<B>>,
    service: String,
    event: String,
    handler: Arc<dyn RequestHandler>,
}

impl<B: PubSubBackend> ListenerJob<B> {
    /// Creates a new instance from raw parts
    pub fn new(
        registry: Arc<ResponderRegistry<B>>,
        service: impl Into<String>,
        event: impl Into<String>,
        handler: impl RequestHandler,
    ) -> Self {
        Self {
            registry,
            service: service.into(),
            event: event.into(),
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl<B: PubSubBackend> Job for ListenerJob<B> {
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    fn name(&self) -> String {
        format!("{}({})", Self::NAME, query_channel(&self.service, &self.event))
    }

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let mut listener = self
            .registry
            .register_handler(&self.service, &self.event, self.handler.clone())
            .await?;

        info!(channel = listener.channel(), "Listening for queries");
        manager.ready().await;

        let stopped_unexpectedly = tokio::select! {
            _ = manager.termination_signal() => false,
            _ = listener.stopped() => true,
        };

        if stopped_unexpectedly {
            warn!(channel = listener.channel(), "Listener stopped unexpectedly");
            self.registry.unregister(&self.service, &self.event).await?;
            return Err(ListenerJobError::Stopped(listener.channel().to_owned()).into());
        }

        self.registry.unregister(&self.service, &self.event).await?;
        listener.stopped().await;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::implementation::memory::{MemoryBackend, MemoryBroker};
    use crate::library::communication::request::{handler_fn, InboundRequest};
    use crate::library::communication::transport::Transport;
    use crate::library::BoxedError;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    fn echo_job(
        broker: &MemoryBroker,
    ) -> (
        Arc<ResponderRegistry<MemoryBackend>>,
        ListenerJob<MemoryBackend>,
    ) {
        let transport = Arc::new(Transport::new(broker.backend()));
        let registry = Arc::new(ResponderRegistry::new(transport));
        let handler = handler_fn(|request: InboundRequest| async move {
            Ok::<_, BoxedError>(request.data)
        });

        (registry.clone(), ListenerJob::new(registry, "echo", "back", handler))
    }

    #[tokio::test]
    async fn fail_when_connection_is_lost() {
        let broker = MemoryBroker::new();
        let (registry, job) = echo_job(&broker);
        let (manager, _dependencies, ready, _termination) = JobManager::new(0, ());

        let execution: JoinHandle<EmptyResult> =
            tokio::spawn(async move { job.execute(manager).await });
        ready.await.unwrap();
        assert_eq!(registry.binding_count(), 1);

        broker.disconnect_all();

        let error = timeout(Duration::from_secs(1), execution)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<ListenerJobError>(),
            Some(ListenerJobError::Stopped(channel)) if channel == "query:echo:back"
        ));
        assert_eq!(registry.binding_count(), 0);
    }

    #[tokio::test]
    async fn unregister_on_termination() {
        let broker = MemoryBroker::new();
        let (registry, job) = echo_job(&broker);
        let (manager, _dependencies, ready, termination) = JobManager::new(0, ());

        let execution: JoinHandle<EmptyResult> =
            tokio::spawn(async move { job.execute(manager).await });
        ready.await.unwrap();
        assert_eq!(broker.subscription_count(), 1);

        termination.send(Some(())).unwrap();

        timeout(Duration::from_secs(1), execution)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(registry.binding_count(), 0);
        assert_eq!(broker.subscription_count(), 0);
    }
}
