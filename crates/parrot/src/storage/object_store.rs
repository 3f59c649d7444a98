use std::io::Read;

use crate::error::StorageError;

/// Blob storage holding the original uploaded media, addressed by key.
pub trait ObjectStore: Send + Sync {
    /// Opens the object for streaming.
    fn get(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError>;

    /// Stores everything `reader` yields under `key`, replacing any previous
    /// object. Returns the number of bytes written.
    fn put(&self, key: &str, reader: &mut dyn Read, content_type: &str)
        -> Result<u64, StorageError>;
}
