//! Authorization service answering file access checks over the message broker

use crate::domain::CHECK_FILE_ACCESS_EVENT;
use crate::harness::{Heart, ListenerJob, Module};
use crate::library::communication::implementation::redis::RedisBackend;
use crate::library::communication::request::{Processor, ResponderRegistry};
use crate::library::communication::transport::{PubSubBackend, Transport};
use crate::library::BoxedError;
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use std::sync::Arc;
use tracing::info;

mod options;
mod policy;
mod service;

pub use options::{Options, PolicyOptions};
pub use policy::{AccessPolicy, Grant, GrantParseError, GrantTable, Pattern};
pub use service::AccessCheckService;

/// Creates a job which answers file access checks for `service_name` using the given policy
pub fn authorization_job<B, P>(
    registry: Arc<ResponderRegistry<B>>,
    service_name: &str,
    policy: P,
) -> ListenerJob<B>
where
    B: PubSubBackend,
    P: AccessPolicy,
{
    ListenerJob::new(
        registry,
        service_name,
        CHECK_FILE_ACCESS_EVENT,
        Processor(AccessCheckService::new(policy)),
    )
}

/// Module implementation
pub struct Auth {
    options: Options,
}

impl Auth {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Auth {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let backend = RedisBackend::new(&self.options.redis.url)?;
        let registry = Arc::new(ResponderRegistry::new(Arc::new(Transport::new(backend))));

        let policy = GrantTable::new(self.options.policy.grants.clone());
        info!(grants = policy.len(), "Loaded access policy");

        let listener_job = authorization_job(registry, &self.options.service_name, policy);

        schedule!(scheduler, { listener_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}
