use crate::domain::FileId;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

/// Flat directory containing the content of each file under its identifier
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates the storage directory if it does not exist yet
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Directory in which files are stored
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &FileId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Writes the content of a file, replacing any previous content
    pub async fn write(&self, id: &FileId, content: &[u8]) -> io::Result<()> {
        trace!(%id, bytes = content.len(), "Writing file");
        fs::write(self.path(id), content).await
    }

    /// Reads the content of a file, returning `None` if it does not exist
    pub async fn read(&self, id: &FileId) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(id)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes the content of a file, doing nothing if it does not exist
    pub async fn remove(&self, id: &FileId) -> io::Result<()> {
        match fs::remove_file(self.path(id)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn keep_content_by_identifier() {
        let directory = tempdir().unwrap();
        let store = FileStore::open(directory.path().join("nested")).await.unwrap();
        let id = Uuid::new_v4();

        store.write(&id, b"hello").await.unwrap();

        assert!(store.root().join(id.to_string()).exists());
        assert_eq!(store.read(&id).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn report_missing_content() {
        let directory = tempdir().unwrap();
        let store = FileStore::open(directory.path()).await.unwrap();
        let id = Uuid::new_v4();

        assert_eq!(store.read(&id).await.unwrap(), None);
        store.remove(&id).await.unwrap();
    }
}
