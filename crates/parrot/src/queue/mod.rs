//! Durable job queue: lanes, retry policy and the scheduler.

pub mod job;
pub mod lane;
pub mod retry;
pub mod scheduler;

pub use job::{Chained, ClaimedJob, JobHandle, JobState, RetryDecision, Stage};
pub use lane::{Lane, LaneSettings, Lanes};
pub use retry::RetryPolicy;
pub use scheduler::{ReapedJob, Scheduler, MAX_JOB_ERROR_CHARS};
