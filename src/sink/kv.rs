use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use super::FrameSink;
use crate::core::error::SinkError;

const FRAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("frames");

/// Single-table redb store: key `video_id/frame_index`, value the frame
/// bytes.
pub struct KvSink {
    db: Database,
}

impl KvSink {
    /// Opens or creates the database file and makes sure the frames
    /// table exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let db = Database::create(path).map_err(|e| SinkError::Backend(e.to_string()))?;
        let txn = db
            .begin_write()
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        txn.open_table(FRAMES)
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        txn.commit().map_err(|e| SinkError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    /// Bytes stored under a key, for inspection and tests.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SinkError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        let table = txn
            .open_table(FRAMES)
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        let value = table
            .get(key)
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    /// Number of stored frames.
    pub fn len(&self) -> Result<u64, SinkError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        let table = txn
            .open_table(FRAMES)
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        table.len().map_err(|e| SinkError::Backend(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(self.len()? == 0)
    }
}

impl FrameSink for KvSink {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| SinkError::Backend(e.to_string()))?;
        let replaced = {
            let mut table = txn
                .open_table(FRAMES)
                .map_err(|e| SinkError::Backend(e.to_string()))?;
            // the returned guard borrows the table, so it has to drop first
            let prior = table
                .insert(key, bytes)
                .map_err(|e| SinkError::Backend(e.to_string()))?;
            prior.is_some()
        };
        if replaced {
            // roll back so the stored bytes stay untouched
            txn.abort().map_err(|e| SinkError::Backend(e.to_string()))?;
            return Err(SinkError::KeyExists(key.to_string()));
        }
        txn.commit().map_err(|e| SinkError::Backend(e.to_string()))?;
        Ok(())
    }
}
