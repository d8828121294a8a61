use crate::domain::{FileId, FileMetadata};
use chrono::{DateTime, Utc};
use sqlx::error::Error as SQLError;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row};
use std::str::FromStr;

pub async fn setup_tables<'e, E>(executor: E) -> Result<(), SQLError>
where
    E: Executor<'e, Database = Sqlite>,
{
    executor.execute(include_str!("sql/schema.sql")).await?;
    Ok(())
}

pub async fn insert_file<'e, E>(metadata: &FileMetadata, executor: E) -> Result<(), SQLError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
            INSERT INTO Files ( Id, Name, Mime, Size, CreationTime )
            VALUES ( $1, $2, $3, $4, $5 )
        "#,
    )
    .bind(metadata.id.to_string())
    .bind(&metadata.name)
    .bind(&metadata.mime)
    .bind(metadata.size as i64)
    .bind(metadata.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn fetch_file<'e, E>(id: &FileId, executor: E) -> Result<Option<FileMetadata>, SQLError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("SELECT Id, Name, Mime, Size, CreationTime FROM Files WHERE Id = $1")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?
        .map(|row| parse_row(&row))
        .transpose()
}

fn parse_row(row: &SqliteRow) -> Result<FileMetadata, SQLError> {
    let id: String = row.try_get("Id")?;
    let size: i64 = row.try_get("Size")?;
    let created_at: String = row.try_get("CreationTime")?;

    Ok(FileMetadata {
        id: FileId::parse_str(&id).map_err(|e| SQLError::Decode(e.into()))?,
        name: row.try_get("Name")?,
        mime: row.try_get("Mime")?,
        size: size as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| SQLError::Decode(e.into()))?
            .with_timezone(&Utc),
    })
}

/// Persistent store of [`FileMetadata`] records backed by SQLite
#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Opens the database at the given URL, creating it and its tables when necessary
    pub async fn open(url: &str) -> Result<Self, SQLError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        setup_tables(&pool).await?;

        Ok(Self { pool })
    }

    /// Persists a new record
    pub async fn insert(&self, metadata: &FileMetadata) -> Result<(), SQLError> {
        insert_file(metadata, &self.pool).await
    }

    /// Looks up a record, returning `None` if it does not exist
    pub async fn get(&self, id: &FileId) -> Result<Option<FileMetadata>, SQLError> {
        fetch_file(id, &self.pool).await
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn store_and_retrieve_records() {
        let directory = tempdir().unwrap();
        let url = format!("sqlite://{}", directory.path().join("files.db").display());
        let store = MetadataStore::open(&url).await.unwrap();

        let metadata = FileMetadata {
            id: Uuid::new_v4(),
            name: "report.pdf".into(),
            mime: "application/pdf".into(),
            size: 1337,
            created_at: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
        };

        store.insert(&metadata).await.unwrap();

        assert_eq!(store.get(&metadata.id).await.unwrap(), Some(metadata));
        assert_eq!(store.get(&Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reject_duplicate_identifiers() {
        let directory = tempdir().unwrap();
        let url = format!("sqlite://{}", directory.path().join("files.db").display());
        let store = MetadataStore::open(&url).await.unwrap();

        let metadata = FileMetadata {
            id: Uuid::new_v4(),
            name: "a".into(),
            mime: "text/plain".into(),
            size: 1,
            created_at: Utc::now(),
        };

        store.insert(&metadata).await.unwrap();
        assert!(store.insert(&metadata).await.is_err());
    }
}
