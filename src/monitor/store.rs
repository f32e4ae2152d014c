use anyhow::Result;
use async_trait::async_trait;

use crate::db::{Database, WatchRecord};

/// Durable per-file watch state as seen by the monitor.
#[async_trait]
pub trait WatchStore: Send + Sync {
    async fn get(&self, file_path: &str) -> Result<Option<WatchRecord>>;
    async fn upsert(&self, record: &WatchRecord) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<WatchRecord>>;
    /// Returns whether a record existed.
    async fn remove(&self, file_path: &str) -> Result<bool>;
}

#[async_trait]
impl WatchStore for Database {
    async fn get(&self, file_path: &str) -> Result<Option<WatchRecord>> {
        self.get_watch_record(file_path).await
    }

    async fn upsert(&self, record: &WatchRecord) -> Result<()> {
        self.upsert_watch_record(record).await
    }

    async fn list_all(&self) -> Result<Vec<WatchRecord>> {
        self.list_watch_records().await
    }

    async fn remove(&self, file_path: &str) -> Result<bool> {
        self.remove_watch_record(file_path).await
    }
}
