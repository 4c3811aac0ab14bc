//! Run statistics and the end-of-run summary

use crate::TaskError;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

const MEGABYTES: f64 = (1u64 << 20) as f64;

/// A file that was downloaded and written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub url: Url,
    pub path: PathBuf,
    pub bytes: u64,
}

/// A URL whose task ended in the failed state
#[derive(Debug)]
pub struct FailedUrl {
    pub url: Url,
    pub error: TaskError,
}

/// Outcome of one crawl run
#[derive(Debug, Default)]
pub struct RunResult {
    /// Pages fetched and processed, in completion order
    pub pages: Vec<Url>,

    /// Files written to the destination, in completion order
    pub files: Vec<DownloadedFile>,

    /// Downloads that failed or were cancelled
    pub files_skipped: u64,

    /// Links dropped by classification, host, or depth filters
    pub links_ignored: u64,

    /// Every failed URL with its reason
    pub errors: Vec<FailedUrl>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// True if the run was stopped through its cancellation token
    pub cancelled: bool,
}

impl RunResult {
    pub fn pages_visited(&self) -> usize {
        self.pages.len()
    }

    pub fn files_downloaded(&self) -> usize {
        self.files.len()
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    /// Download rate in MB/s over the whole run
    pub fn bandwidth(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes_downloaded() as f64 / MEGABYTES) / secs
        } else {
            0.0
        }
    }
}

/// Thread-safe accumulator the workers report into
#[derive(Debug, Default)]
pub(crate) struct RunTally {
    inner: Mutex<RunResult>,
}

impl RunTally {
    pub fn record_page(&self, url: Url) {
        self.with(|r| r.pages.push(url));
    }

    pub fn record_file(&self, file: DownloadedFile) {
        self.with(|r| r.files.push(file));
    }

    pub fn record_ignored(&self, count: u64) {
        self.with(|r| r.links_ignored += count);
    }

    /// Records a failed task; `is_file` also counts it as a skipped download
    pub fn record_failure(&self, url: Url, error: TaskError, is_file: bool) {
        self.with(|r| {
            if is_file {
                r.files_skipped += 1;
            }
            r.errors.push(FailedUrl { url, error });
        });
    }

    /// Takes the accumulated result, leaving the tally empty
    pub fn finish(&self, elapsed: Duration, cancelled: bool) -> RunResult {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result = std::mem::take(&mut *guard);
        result.elapsed = elapsed;
        result.cancelled = cancelled;
        result
    }

    fn with(&self, f: impl FnOnce(&mut RunResult)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Writes the end-of-run summary
pub fn write_summary(out: &mut impl Write, result: &RunResult) -> io::Result<()> {
    writeln!(out, "Files Downloaded: {}", result.files_downloaded())?;
    writeln!(
        out,
        "Bytes Downloaded: {:.2} MB",
        result.bytes_downloaded() as f64 / MEGABYTES
    )?;
    writeln!(out, "Elapsed Time:     {:.2} s", result.elapsed.as_secs_f64())?;
    writeln!(out, "Bandwidth:        {:.2} MB/s", result.bandwidth())?;
    writeln!(out, "Pages Visited:    {}", result.pages_visited())?;
    writeln!(out, "Files Skipped:    {}", result.files_skipped)?;
    writeln!(out, "Links Ignored:    {}", result.links_ignored)?;

    if result.cancelled {
        writeln!(out, "Run was cancelled before the crawl finished")?;
    }

    if !result.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Failed URLs ({}):", result.errors.len())?;
        for failed in &result.errors {
            writeln!(out, "  - {}: {}", failed.url, failed.error)?;
        }
    }

    Ok(())
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(result: &RunResult) {
    let stdout = io::stdout();
    if let Err(e) = write_summary(&mut stdout.lock(), result) {
        tracing::error!("Failed to print summary: {}", e);
    }
}
