use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::models::ChunkRecord;

/// Persistence collaborator for chunk records
pub trait ChunkStore: Send + Sync {
    /// Store records, returning how many were written
    fn insert(&self, records: &[ChunkRecord]) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Appends records as JSON lines to a file
pub struct JsonlChunkStore {
    path: PathBuf,
}

impl JsonlChunkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkStore for JsonlChunkStore {
    async fn insert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError> {
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        Ok(records.len())
    }
}
