//! Crawler module for page crawling and file downloading
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching (one GET per call)
//! - HTML link extraction
//! - The visited registry and the frontier work queue
//! - File downloads with collision-safe, atomic writes
//! - Overall crawl coordination on a fixed worker pool

mod coordinator;
mod downloader;
mod fetcher;
mod frontier;
mod parser;
mod registry;

pub use coordinator::{run_crawl, Coordinator};
pub use downloader::{file_name_for, Downloader};
pub use fetcher::{build_http_client, FetchedResource, Fetcher};
pub use frontier::{CrawlTask, DownloadTask, Frontier, InFlight, Task};
pub use parser::{extract_links, extract_references};
pub use registry::VisitedRegistry;

use crate::config::RunConfig;
use crate::output::RunResult;
use crate::MilesError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl that can be stopped through `cancel`
///
/// This is the main entry point used by the binary. It will:
/// 1. Validate the configuration and prepare the destination
/// 2. Build the HTTP client
/// 3. Seed the frontier with the seed URL
/// 4. Run the worker pool until quiescence or cancellation
/// 5. Return the aggregated `RunResult`
pub async fn crawl(config: RunConfig, cancel: CancellationToken) -> Result<RunResult, MilesError> {
    let coordinator = Coordinator::new(config)?;
    Ok(coordinator.run_with_cancellation(cancel).await)
}
