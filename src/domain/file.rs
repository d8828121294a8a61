use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a stored file
pub type FileId = Uuid;

/// Descriptive record of a stored file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Identifier under which the content is stored
    pub id: FileId,
    /// Original name provided on upload
    pub name: String,
    /// Media type provided on upload
    pub mime: String,
    /// Content length in bytes
    pub size: u64,
    /// Time of upload
    pub created_at: DateTime<Utc>,
}
