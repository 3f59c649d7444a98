use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StorageError;

use super::object_store::ObjectStore;

/// Object store backed by a directory: each key is a relative path under
/// the bucket root.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its file, refusing anything that would escape the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if key.trim().is_empty() {
            return Err(invalid("key is empty"));
        }

        let relative = Path::new(key);
        if relative.is_absolute() || key.starts_with('/') || key.starts_with('\\') {
            return Err(invalid("key must be relative"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => return Err(invalid("key must not contain '..'")),
                _ => return Err(invalid("key contains an unsupported path component")),
            }
        }

        Ok(self.root.join(relative))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let path = self.resolve(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn put(
        &self,
        key: &str,
        reader: &mut dyn Read,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let path = self.resolve(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        self.ensure_directory(&parent)?;

        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_string(),
            source: e,
        };

        // Written beside the target and renamed into place, so readers never
        // see a partial object.
        let mut staged = NamedTempFile::new_in(&parent).map_err(write_err)?;
        let written = std::io::copy(reader, &mut staged).map_err(write_err)?;
        staged.persist(&path).map_err(|e| write_err(e.error))?;

        log::debug!(
            "Stored object {} ({} bytes, {})",
            key,
            written,
            content_type
        );
        Ok(written)
    }
}
