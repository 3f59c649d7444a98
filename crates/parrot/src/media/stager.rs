//! Local staging of recording media.
//!
//! Every file handed out is a [`TempPath`], which deletes the file when
//! dropped. A stage that bails out early with `?` therefore still cleans up
//! both the downloaded original and the transcoded waveform.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{Builder, TempPath};

use crate::error::{StorageError, ToolError};
use crate::storage::ObjectStore;

use super::transcoder::Transcoder;
use super::wav::{WavInfo, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE};

pub struct MediaStager {
    store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
}

impl MediaStager {
    pub fn new<P: AsRef<Path>>(
        store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        work_dir: P,
    ) -> Self {
        Self {
            store,
            transcoder,
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn ensure_work_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)
    }

    /// Streams the object at `key` into a temp file that keeps the key's
    /// extension. A partial download is removed on failure.
    pub fn download(&self, key: &str) -> Result<TempPath, StorageError> {
        let staging_err = |e: std::io::Error| StorageError::Staging {
            path: self.work_dir.clone(),
            source: e,
        };

        self.ensure_work_dir().map_err(staging_err)?;

        let suffix = Path::new(key)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut file = Builder::new()
            .prefix("parrot-src-")
            .suffix(&suffix)
            .tempfile_in(&self.work_dir)
            .map_err(staging_err)?;

        let mut reader = self.store.get(key)?;
        let bytes = std::io::copy(&mut reader, &mut file).map_err(|e| StorageError::Read {
            key: key.to_string(),
            source: e,
        })?;

        log::debug!("Downloaded {} ({} bytes) to {}", key, bytes, file.path().display());
        Ok(file.into_temp_path())
    }

    /// Produces the canonical mono 16 kHz waveform of `input`.
    pub fn transcode(&self, input: &Path) -> Result<TempPath, ToolError> {
        let output_err = |e: std::io::Error| ToolError::Output {
            path: self.work_dir.clone(),
            source: e,
        };

        self.ensure_work_dir().map_err(output_err)?;

        let output = Builder::new()
            .prefix("parrot-wav-")
            .suffix(".wav")
            .tempfile_in(&self.work_dir)
            .map_err(output_err)?
            .into_temp_path();

        self.transcoder.transcode(input, &output)?;
        Ok(output)
    }

    /// Reads the transcoded header and checks it is the canonical format.
    pub fn probe(&self, wav: &Path) -> Result<WavInfo, ToolError> {
        let info = WavInfo::read(wav)?;
        if !info.is_canonical() {
            return Err(ToolError::InvalidOutput {
                path: wav.to_path_buf(),
                reason: format!(
                    "expected {} channel(s) at {} Hz, got {} at {} Hz",
                    CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE, info.channels, info.sample_rate
                ),
            });
        }
        Ok(info)
    }
}
