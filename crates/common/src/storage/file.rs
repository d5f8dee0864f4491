use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Key, MemoryStore, Record, Snapshot, Storage, StorageError, Table};

/// [`MemoryStore`] that writes its full snapshot through to a JSON file
/// after every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    // serializes writers so snapshots hit the disk in order
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open `path`, loading its snapshot if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let memory = match tokio::fs::read(&path).await {
            Ok(bytes) => MemoryStore::from_snapshot(serde_json::from_slice(&bytes)?)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "opened file store");
        Ok(Self {
            path,
            memory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&self.memory.snapshot())?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn get_all(&self, table: Table) -> Result<Vec<Record>, StorageError> {
        self.memory.get_all(table).await
    }

    async fn get(&self, table: Table, key: &Key) -> Result<Option<Record>, StorageError> {
        self.memory.get(table, key).await
    }

    async fn get_in_range(
        &self,
        table: Table,
        lower: &Key,
        upper: &Key,
    ) -> Result<Vec<Record>, StorageError> {
        self.memory.get_in_range(table, lower, upper).await
    }

    async fn put(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        let stored = self.memory.merge(table, record)?;
        self.persist().await?;
        Ok(stored)
    }

    async fn export(&self) -> Result<Snapshot, StorageError> {
        Ok(self.memory.snapshot())
    }

    async fn import(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        self.memory.replace(snapshot)?;
        self.persist().await
    }
}
