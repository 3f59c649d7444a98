use std::sync::Arc;

use crate::db::Database;
use crate::media::{FfmpegTranscoder, MediaStager, Transcoder};
use crate::queue::Scheduler;
use crate::storage::{FsObjectStore, ObjectStore};

use super::config::PipelineConfig;

/// Everything a stage needs, built once at process start and shared by
/// every worker. Cloning is cheap.
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Database,
    pub scheduler: Scheduler,
    pub stager: Arc<MediaStager>,
    pub config: Arc<PipelineConfig>,
}

impl PipelineContext {
    /// Production constructor: opens the database and wires the filesystem
    /// object store and the ffmpeg transcoder.
    pub fn from_config(config: Arc<PipelineConfig>) -> crate::error::Result<Self> {
        let db = Database::open(&config.database_path)?;
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.object_store_root));
        let transcoder: Arc<dyn Transcoder> =
            Arc::new(FfmpegTranscoder::new(config.ffmpeg_bin.clone()));
        Ok(Self::new(db, store, transcoder, config))
    }

    /// Wires the given collaborators.
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let scheduler = Scheduler::new(db.clone(), config.retry.clone(), config.lanes);
        let stager = Arc::new(MediaStager::new(
            store,
            transcoder,
            &config.work_directory,
        ));
        Self {
            db,
            scheduler,
            stager,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        self.stager.store()
    }
}
