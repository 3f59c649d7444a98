use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::pipeline::{mark_failed, Pipeline, PipelineContext};
use crate::queue::Lane;
use crate::worker::result::JobResult;

/// Long-lived worker threads, each bound to one lane, pulling due jobs from
/// the scheduler until shut down.
pub struct WorkerPool {
    result_receiver: Receiver<JobResult>,
    workers: Vec<(Lane, JoinHandle<()>)>,
    shutdown: Arc<AtomicBool>,
    ctx: PipelineContext,
}

impl WorkerPool {
    /// Starts the configured number of workers for every lane in `lanes`.
    pub fn start(ctx: PipelineContext, lanes: &[Lane]) -> Self {
        let worker_count: usize = lanes
            .iter()
            .map(|&lane| ctx.config.lanes.get(lane).workers.max(1))
            .sum();
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count.max(1) * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        let mut worker_id = 0;

        for &lane in lanes {
            for _ in 0..ctx.config.lanes.get(lane).workers.max(1) {
                let result_tx = result_sender.clone();
                let shutdown_flag = Arc::clone(&shutdown);
                let pipeline = Pipeline::new(ctx.clone());

                let handle = thread::spawn(move || {
                    run_worker(worker_id, lane, pipeline, result_tx, shutdown_flag);
                });

                workers.push((lane, handle));
                worker_id += 1;
            }
        }

        info!("Started {} workers", worker_count);

        Self {
            result_receiver,
            workers,
            shutdown,
            ctx,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        for &(lane, _) in &self.workers {
            self.ctx.scheduler.notify(lane);
        }
    }

    /// Flag shared with the workers, for signal handlers.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn wait(self) {
        // Workers may be blocked handing over a result
        drop(self.result_receiver);

        for (i, (lane, worker)) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} ({} lane) panicked: {:?}", i, lane, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    lane: Lane,
    pipeline: Pipeline,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Worker {} started on {} lane", worker_id, lane);

    let ctx = pipeline.context().clone();
    let poll_interval = ctx.config.poll_interval;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match ctx.scheduler.reap_expired(Utc::now()) {
            Ok(reaped) => {
                for job in reaped {
                    warn!("Worker {} reaped job {}: {}", worker_id, job.job.id, job.error);
                    mark_failed(
                        &ctx.db,
                        &job.job.recording_id,
                        &job.error,
                        ctx.config.error_log_max_chars,
                    );
                    if !deliver(worker_id, &result_sender, JobResult::reaped(&job), poll_interval) {
                        return;
                    }
                }
            }
            Err(e) => error!("Worker {} failed to reap expired jobs: {}", worker_id, e),
        }

        match ctx.scheduler.claim_next(lane, Utc::now()) {
            Ok(Some(job)) => {
                debug!(
                    "Worker {} processing {} job {} (attempt {})",
                    worker_id, job.stage, job.id, job.attempt
                );
                let result = pipeline.run(&job);
                if !deliver(worker_id, &result_sender, result, poll_interval) {
                    break;
                }
            }
            Ok(None) => {
                ctx.scheduler.wait_for_work(lane, poll_interval);
            }
            Err(e) => {
                error!("Worker {} failed to claim a job: {}", worker_id, e);
                thread::sleep(poll_interval);
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Hands a result to the pool owner. Results nobody collects are dropped;
/// returns false once the receiving side is gone.
fn deliver(
    worker_id: usize,
    sender: &Sender<JobResult>,
    result: JobResult,
    timeout: Duration,
) -> bool {
    match sender.send_timeout(result, timeout) {
        Ok(()) => true,
        Err(SendTimeoutError::Timeout(result)) => {
            debug!("Worker {} dropped uncollected result for job {}", worker_id, result.job_id);
            true
        }
        Err(SendTimeoutError::Disconnected(_)) => {
            debug!("Worker {} result channel disconnected", worker_id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::Config;
    use crate::db::recording_repo::{self, Recording};
    use crate::db::{transcript_repo, Database};
    use crate::error::ToolError;
    use crate::media::Transcoder;
    use crate::pipeline::{PipelineConfig, RecordingStatus};
    use crate::queue::Stage;
    use crate::storage::FsObjectStore;
    use crate::worker::result::JobOutcome;
    use tempfile::TempDir;

    struct NoopTranscoder;

    impl Transcoder for NoopTranscoder {
        fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), ToolError> {
            Ok(())
        }
    }

    fn create_test_context(dir: &TempDir) -> PipelineContext {
        let mut config = Config::default();
        config.work_directory = dir.path().join("work").display().to_string();
        config.poll_interval_ms = 20;
        PipelineContext::new(
            Database::open_in_memory().unwrap(),
            Arc::new(FsObjectStore::new(dir.path().join("bucket"))),
            Arc::new(NoopTranscoder),
            Arc::new(PipelineConfig::from_config(&config)),
        )
    }

    fn insert_transcribed(ctx: &PipelineContext, id: &str) {
        ctx.db
            .with_conn(|conn| {
                recording_repo::insert(
                    conn,
                    &Recording {
                        id: id.to_string(),
                        filename: "a.m4a".to_string(),
                        mime_type: "audio/mp4".to_string(),
                        file_size: 1,
                        sha256: "x".to_string(),
                        source_key: Some("uploads/a.m4a".to_string()),
                        status: RecordingStatus::Processing,
                        created_at: Utc::now(),
                        duration_sec: Some(1),
                        upload_completed_at: None,
                        transcribed_at: Some(Utc::now()),
                        summarized_at: None,
                        tasks_extracted_at: None,
                        error_log: None,
                    },
                )?;
                transcript_repo::find_or_create(conn, id, "hello", Utc::now())
            })
            .unwrap();
    }

    #[test]
    fn test_worker_pool_creation() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = create_test_context(&temp_dir);
        let pool = WorkerPool::start(ctx, &Lane::ALL);

        // 1 heavy + 2 light by default
        assert_eq!(pool.worker_count(), 3);
        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());

        pool.wait();
    }

    #[test]
    fn test_light_worker_runs_summarize_job() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = create_test_context(&temp_dir);
        insert_transcribed(&ctx, "r1");

        let pool = WorkerPool::start(ctx.clone(), &[Lane::Light]);
        let handle = ctx.scheduler.enqueue(Stage::Summarize, "r1").unwrap();

        let result = pool
            .recv_result_timeout(Duration::from_secs(10))
            .expect("no result");
        assert_eq!(result.job_id, handle.id);
        assert_eq!(result.outcome, JobOutcome::Succeeded);

        pool.shutdown();
        pool.wait();

        let status = ctx
            .db
            .with_conn(|conn| recording_repo::find_status(conn, "r1"))
            .unwrap();
        assert_eq!(status, Some(RecordingStatus::Ready));
    }

    #[test]
    fn test_heavy_only_pool_ignores_light_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = create_test_context(&temp_dir);
        insert_transcribed(&ctx, "r1");
        ctx.scheduler.enqueue(Stage::Summarize, "r1").unwrap();

        let pool = WorkerPool::start(ctx.clone(), &[Lane::Heavy]);
        assert!(pool.recv_result_timeout(Duration::from_millis(200)).is_none());
        pool.shutdown();
        pool.wait();
    }
}
