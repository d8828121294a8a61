use crate::domain::FileId;
use thiserror::Error;
use warp::http::StatusCode;

/// Error returned by the [`FileService`](super::FileService)
#[derive(Error, Debug)]
pub enum FileServiceError {
    /// No file with the given identifier exists
    #[error("file {0} does not exist")]
    NotFound(FileId),
    /// Request did not identify a session
    #[error("session identifier missing")]
    MissingSession,
    /// Authorization service denied access or could not be asked
    #[error("access to file {0} denied")]
    AccessDenied(FileId),
    /// Reading or writing file content failed
    #[error("file storage failed")]
    Storage(#[from] std::io::Error),
    /// Reading or writing metadata failed
    #[error("metadata database failed")]
    Database(#[from] sqlx::Error),
}

impl FileServiceError {
    /// HTTP status code representing this error
    pub fn status(&self) -> StatusCode {
        match self {
            FileServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServiceError::MissingSession => StatusCode::UNAUTHORIZED,
            FileServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
            FileServiceError::Storage(_) | FileServiceError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
