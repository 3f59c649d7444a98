//! Test harness for isolated pipeline runs.
//!
//! `TestHarness` owns a temp directory holding the object-store bucket and
//! the work directory, an in-memory database, and a `PipelineContext` wired
//! to a fake transcoder so no ffmpeg binary is needed.

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use parrot::config::Config;
use parrot::db::job_repo::{JobFilter, JobRow};
use parrot::db::recording_repo::{self, Recording};
use parrot::db::transcript_repo::{self, Transcript};
use parrot::db::Database;
use parrot::error::ToolError;
use parrot::media::Transcoder;
use parrot::storage::{FsObjectStore, ObjectStore};
use parrot::{drain, JobResult, Lane, Pipeline, PipelineConfig, PipelineContext, RecordingStatus};

use super::builders::RecordingBuilder;

/// Writes a canonical mono 16 kHz WAV of fixed length instead of running
/// ffmpeg.
pub struct FakeTranscoder {
    seconds: u32,
    calls: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new(seconds: u32) -> Self {
        Self {
            seconds,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "transcoder input missing: {}", input.display());

        let invalid = |e: hound::Error| ToolError::InvalidOutput {
            path: output.to_path_buf(),
            reason: e.to_string(),
        };
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec).map_err(invalid)?;
        for _ in 0..(16_000 * self.seconds) {
            writer.write_sample(0i16).map_err(invalid)?;
        }
        writer.finalize().map_err(invalid)
    }
}

/// Fails like ffmpeg exiting non-zero.
pub struct FailingTranscoder {
    calls: AtomicUsize,
}

impl FailingTranscoder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FailingTranscoder {
    fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ToolError::Failed {
            program: "ffmpeg".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "moov atom not found".to_string(),
        })
    }
}

/// Test harness providing an isolated pipeline for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub bucket_dir: PathBuf,
    pub work_dir: PathBuf,
    pub ctx: PipelineContext,
}

impl TestHarness {
    /// Harness with a fake transcoder producing two seconds of audio.
    pub fn new() -> Self {
        Self::with_transcoder(Arc::new(FakeTranscoder::new(2)))
    }

    pub fn with_transcoder(transcoder: Arc<dyn Transcoder>) -> Self {
        Self::build(transcoder, |_| {})
    }

    /// Harness whose config is adjusted by `configure` before wiring.
    pub fn build<F>(transcoder: Arc<dyn Transcoder>, configure: F) -> Self
    where
        F: FnOnce(&mut Config),
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let bucket_dir = temp_dir.path().join("bucket");
        let work_dir = temp_dir.path().join("work");

        let mut config = Config::default();
        config.work_directory = work_dir.display().to_string();
        config.object_store.root = bucket_dir.display().to_string();
        config.poll_interval_ms = 20;
        configure(&mut config);

        let ctx = PipelineContext::new(
            Database::open_in_memory().expect("Failed to open database"),
            Arc::new(FsObjectStore::new(&bucket_dir)),
            transcoder,
            Arc::new(PipelineConfig::from_config(&config)),
        );

        Self {
            temp_dir,
            bucket_dir,
            work_dir,
            ctx,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Puts `bytes` in the bucket under `key`.
    pub fn upload(&self, key: &str, bytes: &[u8]) {
        let mut reader = bytes;
        self.ctx
            .store()
            .put(key, &mut reader, "audio/mp4")
            .expect("Failed to upload object");
    }

    pub fn read_object(&self, key: &str) -> Vec<u8> {
        let mut out = Vec::new();
        self.ctx
            .store()
            .get(key)
            .expect("Failed to open object")
            .read_to_end(&mut out)
            .expect("Failed to read object");
        out
    }

    /// Inserts a recording in `status` and uploads its source object.
    pub fn uploaded_recording(&self, id: &str, status: RecordingStatus) -> Recording {
        let recording = RecordingBuilder::new(id).status(status).insert(&self.ctx.db);
        if let Some(key) = recording.source_key.as_deref() {
            self.upload(key, b"not really audio");
        }
        recording
    }

    pub fn recording(&self, id: &str) -> Recording {
        self.ctx
            .db
            .with_conn(|conn| recording_repo::find_by_id(conn, id))
            .expect("Failed to load recording")
            .expect("Recording missing")
    }

    pub fn status(&self, id: &str) -> RecordingStatus {
        self.recording(id).status
    }

    pub fn transcript(&self, id: &str) -> Option<Transcript> {
        self.ctx
            .db
            .with_conn(|conn| transcript_repo::find_by_recording(conn, id))
            .expect("Failed to load transcript")
    }

    pub fn transcript_count(&self, id: &str) -> u64 {
        self.ctx
            .db
            .with_conn(|conn| transcript_repo::count_for_recording(conn, id))
            .expect("Failed to count transcripts")
    }

    /// Jobs for one recording, in creation order.
    pub fn jobs(&self, id: &str) -> Vec<JobRow> {
        let (mut jobs, _) = self
            .ctx
            .scheduler
            .list(&JobFilter {
                recording_id: Some(id.to_string()),
                ..Default::default()
            })
            .expect("Failed to list jobs");
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.ctx.clone())
    }

    /// Runs every due job on both lanes.
    pub fn drain(&self) -> Vec<JobResult> {
        drain(&self.pipeline(), &Lane::ALL).expect("Failed to drain jobs")
    }

    /// Files left behind in the work directory.
    pub fn work_dir_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.work_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
