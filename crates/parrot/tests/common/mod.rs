//! Shared test utilities for parrot integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated pipeline runs over a temp bucket and work dir
//! - Fake transcoders standing in for ffmpeg
//! - Builders for recordings and config files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FailingTranscoder, FakeTranscoder, TestHarness};
