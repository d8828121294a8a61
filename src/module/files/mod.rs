//! HTTP file service gating downloads behind the authorization service

use crate::harness::{Heart, Module};
use crate::library::communication::implementation::redis::RedisBackend;
use crate::library::communication::request::Requestor;
use crate::library::communication::transport::{PubSubBackend, Transport};
use crate::library::BoxedError;
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use std::sync::Arc;
use tracing::info;

mod access;
mod error;
mod metadata;
mod options;
mod server;
mod service;
mod store;

pub use access::{AccessChecker, RemoteAccessChecker};
pub use error::FileServiceError;
pub use metadata::MetadataStore;
pub use options::{Options, ServerOptions};
pub use server::{routes, ServerJob, SESSION_HEADER};
pub use service::FileService;
pub use store::FileStore;

/// Opens the stores and creates a job serving them, checking access through the given transport
pub async fn server_job<B: PubSubBackend>(
    options: &ServerOptions,
    transport: Arc<Transport<B>>,
) -> Result<ServerJob<RemoteAccessChecker<B>>, BoxedError> {
    let files = FileStore::open(&options.storage_dir).await?;
    let metadata = MetadataStore::open(&options.database).await?;
    info!(storage = ?files.root(), database = %options.database, "Opened file stores");

    let access = RemoteAccessChecker::new(
        Requestor::new(transport),
        options.query.auth_service.clone(),
        options.query.access_timeout,
    );

    let service = FileService::new(files, metadata, access);

    Ok(ServerJob::new(options.port, options.upload_limit, service))
}

/// Module implementation
pub struct Files {
    options: Options,
}

impl Files {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Files {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let backend = RedisBackend::new(&self.options.redis.url)?;
        let transport = Arc::new(Transport::new(backend));

        let server_job = server_job(&self.options.server, transport).await?;

        schedule!(scheduler, { server_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}
