//! Argument definitions for the `parrot` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parrot::queue::JobState;
use parrot::{Lane, RecordingStatus};

/// Recording pipeline: import media, trigger processing, run workers
#[derive(Parser, Debug)]
#[command(name = "parrot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local media file and register it as a recording
    Import {
        /// File to import
        file: PathBuf,

        /// Media type to record instead of the detected one
        #[arg(long, value_name = "MIME")]
        mime: Option<String>,

        /// Trigger processing right after the import
        #[arg(long)]
        trigger: bool,
    },

    /// Start processing a recording
    Trigger {
        /// Recording id
        id: String,
    },

    /// Run workers for one or both lanes
    Work {
        /// Only serve this lane (heavy or light)
        #[arg(long, value_name = "LANE")]
        lane: Option<Lane>,

        /// Run every due job once, then exit
        #[arg(long)]
        burst: bool,
    },

    /// Show a recording with its transcript and jobs
    Show {
        /// Recording id
        id: String,
    },

    /// List the action items extracted from a recording
    Tasks {
        /// Recording id
        id: String,
    },

    /// List recordings, newest first
    List {
        #[arg(long, value_name = "STATUS")]
        status: Option<RecordingStatus>,

        #[arg(long, default_value = "20")]
        limit: u64,

        #[arg(long, default_value = "0")]
        offset: u64,
    },

    /// List jobs
    Jobs {
        #[arg(long, value_name = "STATE")]
        state: Option<JobState>,

        /// Only jobs for this recording
        #[arg(long, value_name = "ID")]
        recording: Option<String>,

        #[arg(long, value_name = "LANE")]
        lane: Option<Lane>,

        #[arg(long, default_value = "50")]
        limit: u64,
    },

    /// Print recording, job and transcript counts
    Stats,
}

impl Cli {
    /// Lanes selected by `work --lane`, both when unset.
    pub fn lanes(lane: Option<Lane>) -> Vec<Lane> {
        match lane {
            Some(lane) => vec![lane],
            None => Lane::ALL.to_vec(),
        }
    }
}
