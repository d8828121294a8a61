use super::access::AccessChecker;
use super::error::FileServiceError;
use super::metadata::MetadataStore;
use super::store::FileStore;
use crate::domain::{FileId, FileMetadata};
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Stores files and serves them to sessions the authorization service vouches for
pub struct FileService<A: AccessChecker> {
    files: FileStore,
    metadata: MetadataStore,
    access: A,
}

impl<A: AccessChecker> FileService<A> {
    /// Creates a new instance from raw parts
    pub fn new(files: FileStore, metadata: MetadataStore, access: A) -> Self {
        Self {
            files,
            metadata,
            access,
        }
    }

    /// Stores new content and returns the record describing it
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn upload(
        &self,
        name: Option<String>,
        mime: Option<String>,
        content: &[u8],
    ) -> Result<FileMetadata, FileServiceError> {
        let id = Uuid::new_v4();
        let metadata = FileMetadata {
            id,
            name: name.unwrap_or_else(|| id.to_string()),
            mime: mime.unwrap_or_else(|| DEFAULT_MIME.to_owned()),
            size: content.len() as u64,
            created_at: Utc::now(),
        };

        self.files.write(&id, content).await?;

        if let Err(error) = self.metadata.insert(&metadata).await {
            if let Err(cleanup) = self.files.remove(&id).await {
                warn!(?cleanup, %id, "Failed to remove orphaned file content");
            }

            return Err(error.into());
        }

        info!(%id, "Stored file");
        Ok(metadata)
    }

    /// Looks up the record of a file
    pub async fn metadata(&self, id: &FileId) -> Result<FileMetadata, FileServiceError> {
        self.metadata
            .get(id)
            .await?
            .ok_or(FileServiceError::NotFound(*id))
    }

    /// Returns the content of a file if the session has been granted access to it
    #[instrument(skip(self))]
    pub async fn download(
        &self,
        session_id: Option<&str>,
        id: &FileId,
    ) -> Result<(FileMetadata, Vec<u8>), FileServiceError> {
        let session_id = session_id.ok_or(FileServiceError::MissingSession)?;
        let metadata = self.metadata(id).await?;

        if !self.access.may_read(session_id, id).await {
            info!("Access denied");
            return Err(FileServiceError::AccessDenied(*id));
        }

        let content = self
            .files
            .read(id)
            .await?
            .ok_or(FileServiceError::NotFound(*id))?;

        Ok((metadata, content))
    }
}
