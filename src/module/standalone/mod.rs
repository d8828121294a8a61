//! Authorization and file service within a single process, connected by an in-memory broker

use crate::harness::{Heart, Module};
use crate::library::communication::implementation::memory::MemoryBroker;
use crate::library::communication::request::ResponderRegistry;
use crate::library::communication::transport::Transport;
use crate::library::BoxedError;
use crate::module::auth::{authorization_job, GrantTable, PolicyOptions};
use crate::module::files::{server_job, ServerOptions};
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use std::sync::Arc;
use structopt::StructOpt;

/// Options for the standalone module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub server: ServerOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub policy: PolicyOptions,
}

/// Module implementation
pub struct Standalone {
    options: Options,
    broker: MemoryBroker,
}

impl Standalone {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self {
            options,
            broker: MemoryBroker::new(),
        }
    }
}

#[async_trait]
impl Module for Standalone {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let registry = Arc::new(ResponderRegistry::new(Arc::new(Transport::new(
            self.broker.backend(),
        ))));
        let policy = GrantTable::new(self.options.policy.grants.clone());
        let listener_job =
            authorization_job(registry, &self.options.server.query.auth_service, policy);

        let transport = Arc::new(Transport::new(self.broker.backend()));
        let server_job = server_job(&self.options.server, transport).await?;

        schedule!(scheduler, { listener_job, server_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}
