mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use parrot::db::job_repo::{JobFilter, JobRow};
use parrot::db::recording_repo::{self, Recording, RecordingFilter};
use parrot::db::task_repo::{self, Task};
use parrot::db::transcript_repo::{self, Transcript};
use parrot::db::{stats_repo, DatabaseError};
use parrot::{
    drain, import_file, load_config_or_default, trigger, ConfigError, ImportError, ParrotError,
    Pipeline, PipelineConfig, PipelineContext, PipelineError, SchedulerError, TriggerOutcome,
    WorkerPool,
};

use crate::cli::{Cli, Commands};

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Parrot(#[from] ParrotError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Recording not found: {0}")]
    RecordingNotFound(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportOutput {
    recording: Recording,
    #[serde(skip_serializing_if = "Option::is_none")]
    trigger: Option<TriggerOutcome>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutput {
    recording: Recording,
    transcript: Option<Transcript>,
    tasks: Vec<Task>,
    jobs: Vec<JobRow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobsOutput {
    jobs: Vec<JobRow>,
    total: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config_or_default(cli.config.as_deref())?;
    parrot::logging::init(&config.logging)?;

    let pipeline_config = Arc::new(PipelineConfig::from_config(&config));
    let ctx = PipelineContext::from_config(pipeline_config)?;

    match cli.command {
        Commands::Import {
            file,
            mime,
            trigger: also_trigger,
        } => run_import(&ctx, &file, mime.as_deref(), also_trigger),
        Commands::Trigger { id } => print_json(&trigger(&ctx, &id)?),
        Commands::Work { lane, burst } => run_work(ctx, &Cli::lanes(lane), burst),
        Commands::Show { id } => run_show(&ctx, &id),
        Commands::Tasks { id } => {
            require_recording(&ctx, &id)?;
            let tasks = ctx
                .db
                .with_conn(|conn| task_repo::list_for_recording(conn, &id))?;
            print_json(&tasks)
        }
        Commands::List {
            status,
            limit,
            offset,
        } => {
            let filter = RecordingFilter {
                status,
                limit: Some(limit),
                offset: Some(offset),
            };
            let recordings = ctx.db.with_conn(|conn| recording_repo::list(conn, &filter))?;
            print_json(&recordings)
        }
        Commands::Jobs {
            state,
            recording,
            lane,
            limit,
        } => {
            let filter = JobFilter {
                state,
                lane,
                recording_id: recording,
                limit: Some(limit),
                ..Default::default()
            };
            let (jobs, total) = ctx.scheduler.list(&filter)?;
            print_json(&JobsOutput { jobs, total })
        }
        Commands::Stats => {
            let stats = ctx.db.with_conn(stats_repo::collect)?;
            print_json(&stats)
        }
    }
}

fn run_import(
    ctx: &PipelineContext,
    file: &Path,
    mime: Option<&str>,
    also_trigger: bool,
) -> Result<(), CliError> {
    let recording = import_file(ctx, file, mime)?;
    let triggered = if also_trigger {
        Some(trigger(ctx, &recording.id)?)
    } else {
        None
    };
    print_json(&ImportOutput {
        recording,
        trigger: triggered,
    })
}

fn require_recording(ctx: &PipelineContext, id: &str) -> Result<Recording, CliError> {
    ctx.db
        .with_conn(|conn| recording_repo::find_by_id(conn, id))?
        .ok_or_else(|| CliError::RecordingNotFound(id.to_string()))
}

fn run_show(ctx: &PipelineContext, id: &str) -> Result<(), CliError> {
    let recording = require_recording(ctx, id)?;
    let transcript = ctx
        .db
        .with_conn(|conn| transcript_repo::find_by_recording(conn, id))?;
    let tasks = ctx
        .db
        .with_conn(|conn| task_repo::list_for_recording(conn, id))?;
    let (jobs, _) = ctx.scheduler.list(&JobFilter {
        recording_id: Some(id.to_string()),
        ..Default::default()
    })?;

    print_json(&ShowOutput {
        recording,
        transcript,
        tasks,
        jobs,
    })
}

fn run_work(ctx: PipelineContext, lanes: &[parrot::Lane], burst: bool) -> Result<(), CliError> {
    if burst {
        let results = drain(&Pipeline::new(ctx), lanes)?;
        return print_json(&results);
    }

    let pool = WorkerPool::start(ctx, lanes);
    let shutdown = pool.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::Relaxed);
    })?;

    info!("Workers running, press Ctrl-C to stop");
    while !pool.is_shutdown() {
        if let Some(result) = pool.recv_result_timeout(Duration::from_millis(500)) {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    pool.shutdown();
    pool.wait();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
