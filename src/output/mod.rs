//! Output module for run results and summaries
//!
//! This module handles:
//! - The `RunResult` value produced once at the end of a run
//! - Aggregating per-task outcomes while workers are running
//! - Printing the end-of-run summary

pub mod stats;

pub use stats::{print_summary, write_summary, DownloadedFile, FailedUrl, RunResult};
pub(crate) use stats::RunTally;
