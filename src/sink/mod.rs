pub mod dir;
pub mod kv;

pub use dir::DirSink;
pub use kv::KvSink;

use std::sync::Mutex;

use crate::core::error::SinkError;

/// Durable destination for kept frames. Keys look like
/// `video_id/frame_index`; writers never read back.
pub trait FrameSink: Send + Sync {
    /// Stores one frame under its key. A key that is already present is
    /// an error; the pipeline never writes the same key twice.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError>;
}

/// Sink collecting everything in memory, mostly for tests.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored key/bytes pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for MemorySink {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|(stored, _)| stored == key) {
            return Err(SinkError::KeyExists(key.to_string()));
        }
        entries.push((key.to_string(), bytes.to_vec()));
        Ok(())
    }
}
