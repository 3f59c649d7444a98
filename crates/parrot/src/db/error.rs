//! Failures of the recording and job store.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be prepared.
    #[error("cannot prepare database location '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema migration {version} did not apply: {reason}")]
    Migration { version: u32, reason: String },

    /// A thread panicked while holding the connection.
    #[error("database connection poisoned by a panicked holder")]
    LockPoisoned,
}
