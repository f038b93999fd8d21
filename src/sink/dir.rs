use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use super::FrameSink;
use crate::core::error::SinkError;

/// Writes each frame as `<root>/<video_id>/<frame_index>.jpg`.
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    /// Creates the root directory if it does not exist yet.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl FrameSink for DirSink {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let path = self.root.join(format!("{}.jpg", key));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // create_new makes the existence check atomic
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SinkError::KeyExists(key.to_string()))
            }
            Err(err) => return Err(SinkError::Io(err)),
        };
        file.write_all(bytes)?;
        Ok(())
    }
}
