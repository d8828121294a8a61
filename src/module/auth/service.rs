use super::policy::AccessPolicy;
use crate::domain::{FileAccessRequest, FileAccessResponse};
use crate::library::communication::request::RequestProcessor;
use crate::library::BoxedError;
use async_trait::async_trait;
use tracing::{info, instrument};

/// Answers file access checks by consulting an [`AccessPolicy`]
pub struct AccessCheckService<P: AccessPolicy> {
    policy: P,
}

impl<P: AccessPolicy> AccessCheckService<P> {
    /// Creates a new instance from raw parts
    pub fn new(policy: P) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl<P: AccessPolicy> RequestProcessor for AccessCheckService<P> {
    type Request = FileAccessRequest;
    type Response = FileAccessResponse;

    #[instrument(skip(self, request), fields(session = %request.session_id, file = %request.file_id))]
    async fn process(&self, request: FileAccessRequest) -> Result<FileAccessResponse, BoxedError> {
        let allowed = self.policy.is_allowed(&request).await;
        info!(allowed, "Access decision");

        Ok(FileAccessResponse { allowed })
    }
}
