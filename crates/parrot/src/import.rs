//! Local import: puts a media file into the object store and registers it
//! as a recording, ready to be triggered.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::db::recording_repo::{self, Recording};
use crate::error::ImportError;
use crate::pipeline::{PipelineContext, RecordingStatus};

/// Media types accepted for import, after normalization.
pub const ALLOWED_MIME_TYPES: [&str; 9] = [
    "video/mp4",
    "audio/mp4",
    "audio/x-m4a",
    "audio/m4a",
    "audio/mpeg",
    "audio/aac",
    "audio/x-aac",
    "audio/wav",
    "audio/x-wav",
];

const FALLBACK_MIME: &str = "application/octet-stream";

/// Resolves the media type of `filename`. An explicit override wins, then
/// the pinned recorder extensions, then `mime_guess`.
pub fn normalize_mime(filename: &str, override_mime: Option<&str>) -> String {
    if let Some(mime) = override_mime.map(str::trim).filter(|m| !m.is_empty()) {
        return mime.to_lowercase();
    }

    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("m4a") => "audio/mp4".to_string(),
        Some("mp3") => "audio/mpeg".to_string(),
        Some("wav") => "audio/wav".to_string(),
        Some("mp4") => "video/mp4".to_string(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string()),
    }
}

pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

/// Object key for a new upload: `uploads/YYYY/MM/DD/<uuid>-<filename>`.
pub fn upload_key(filename: &str) -> String {
    format!(
        "uploads/{}/{}-{}",
        Utc::now().format("%Y/%m/%d"),
        uuid::Uuid::new_v4(),
        filename
    )
}

/// Reader adapter that hashes and counts everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Returns the hex digest and byte count of what was read.
    pub fn finish(self) -> (String, u64) {
        (format!("{:x}", self.hasher.finalize()), self.bytes)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Uploads `path` and inserts a recording in the `uploaded` state.
pub fn import_file(
    ctx: &PipelineContext,
    path: &Path,
    mime_override: Option<&str>,
) -> Result<Recording, ImportError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ImportError::MissingFileName(path.to_path_buf()))?;

    let mime_type = normalize_mime(&filename, mime_override);
    if !is_allowed_mime(&mime_type) {
        return Err(ImportError::UnsupportedMediaType { mime: mime_type });
    }

    let read_err = |source| ImportError::ReadFile {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();
    let max = ctx.config.max_upload_bytes;
    if size > max {
        return Err(ImportError::TooLarge { size, max });
    }

    let key = upload_key(&filename);
    let mut reader = HashingReader::new(file.take(max.saturating_add(1)));
    ctx.store().put(&key, &mut reader, &mime_type)?;
    let (sha256, file_size) = reader.finish();
    if file_size > max {
        return Err(ImportError::TooLarge {
            size: file_size,
            max,
        });
    }

    let recording = Recording {
        id: uuid::Uuid::new_v4().to_string(),
        filename,
        mime_type,
        file_size: file_size as i64,
        sha256,
        source_key: Some(key),
        status: RecordingStatus::Uploaded,
        created_at: Utc::now(),
        duration_sec: None,
        upload_completed_at: None,
        transcribed_at: None,
        summarized_at: None,
        tasks_extracted_at: None,
        error_log: None,
    };
    ctx.db
        .with_conn(|conn| recording_repo::insert(conn, &recording))?;

    info!(
        recording_id = %recording.id,
        key = recording.source_key.as_deref().unwrap_or_default(),
        bytes = recording.file_size,
        "Imported recording"
    );
    Ok(recording)
}
