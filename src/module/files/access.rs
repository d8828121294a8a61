use crate::domain::{FileAccessRequest, FileAccessResponse, FileId, CHECK_FILE_ACCESS_EVENT};
use crate::library::communication::request::{Requestor, Typed};
use crate::library::communication::transport::PubSubBackend;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Decides whether a session may read a file
#[async_trait]
pub trait AccessChecker: Send + Sync + 'static {
    /// Returns true only if access has been explicitly granted
    async fn may_read(&self, session_id: &str, file_id: &FileId) -> bool;
}

/// [`AccessChecker`] which asks the authorization service over the message broker
///
/// Any failure to obtain an answer is treated as a denial.
pub struct RemoteAccessChecker<B: PubSubBackend> {
    requestor: Requestor<B>,
    service: String,
    timeout: Duration,
}

impl<B: PubSubBackend> RemoteAccessChecker<B> {
    /// Creates a new instance which queries `service` and waits at most `timeout` for an answer
    pub fn new(requestor: Requestor<B>, service: impl Into<String>, timeout: Duration) -> Self {
        Self {
            requestor,
            service: service.into(),
            timeout,
        }
    }
}

#[async_trait]
impl<B: PubSubBackend> AccessChecker for RemoteAccessChecker<B> {
    #[instrument(skip(self))]
    async fn may_read(&self, session_id: &str, file_id: &FileId) -> bool {
        let request = FileAccessRequest {
            session_id: session_id.to_owned(),
            file_id: file_id.to_string(),
        };

        let response = self
            .requestor
            .query(
                &self.service,
                CHECK_FILE_ACCESS_EVENT,
                &request,
                &Typed::<FileAccessResponse>::new(),
                Some(self.timeout),
            )
            .await;

        match response {
            Ok(FileAccessResponse { allowed }) => {
                debug!(allowed, "Received access decision");
                allowed
            }
            Err(error) => {
                warn!(?error, "Unable to check file access, denying");
                false
            }
        }
    }
}
