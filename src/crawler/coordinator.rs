//! Crawler coordinator - main crawl orchestration logic
//!
//! This module runs the worker pool that drives a crawl:
//! - Seeding the frontier and visited registry
//! - Fetching pages with bounded retries and exponential backoff
//! - Extracting, classifying and claiming discovered links
//! - Downloading files on the same pool as page fetches
//! - Draining on quiescence or cancellation and producing the `RunResult`
//!
//! Per task the lifecycle is `Queued -> Claimed -> Fetching ->
//! (Extracting | Writing) -> Done | Failed`. A URL is claimed in the registry
//! before it is queued, so the queue never holds the same URL twice.
//!
//! The registry is keyed by the normalized URL, but requests go to the
//! address exactly as discovered (minus its fragment), and relative links
//! resolve against the address that was actually served.

use crate::config::{validate, RunConfig};
use crate::crawler::downloader::Downloader;
use crate::crawler::fetcher::{FetchedResource, Fetcher};
use crate::crawler::frontier::{CrawlTask, DownloadTask, Frontier, Task};
use crate::crawler::parser::extract_references;
use crate::crawler::registry::VisitedRegistry;
use crate::output::{DownloadedFile, RunResult, RunTally};
use crate::state::UrlState;
use crate::url::{classify_resource, normalize_parsed, normalize_url, same_site, ResourceClass};
use crate::{ConfigError, MilesError, TaskError, UrlError, WriteError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<RunConfig>,
    seed: Url,
    seed_fetch_url: Url,
    fetcher: Fetcher,
    downloader: Downloader,
    registry: Arc<VisitedRegistry>,
    frontier: Arc<Frontier>,
}

/// State shared by every worker of one run
struct Worker {
    config: Arc<RunConfig>,
    seed: Url,
    fetcher: Fetcher,
    downloader: Downloader,
    registry: Arc<VisitedRegistry>,
    frontier: Arc<Frontier>,
    tally: RunTally,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the configuration, normalizes the seed URL, creates the
    /// destination directory, and builds the HTTP client. Every error here
    /// is fatal and happens before any worker is spawned.
    pub fn new(config: RunConfig) -> Result<Self, MilesError> {
        validate(&config)?;

        let seed = normalize_url(&config.seed_url)?;
        let mut seed_fetch_url =
            Url::parse(config.seed_url.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        seed_fetch_url.set_fragment(None);

        let downloader = Downloader::new(&config.destination);
        downloader
            .prepare()
            .map_err(|source| ConfigError::Destination {
                path: config.destination.clone(),
                source,
            })?;

        let fetcher = Fetcher::new(&config.fetch)?;

        Ok(Self {
            config: Arc::new(config),
            seed,
            seed_fetch_url,
            fetcher,
            downloader,
            registry: Arc::new(VisitedRegistry::new()),
            frontier: Arc::new(Frontier::new()),
        })
    }

    /// The run's visited registry (shared with the workers)
    pub fn registry(&self) -> Arc<VisitedRegistry> {
        Arc::clone(&self.registry)
    }

    /// The run's frontier (shared with the workers)
    pub fn frontier(&self) -> Arc<Frontier> {
        Arc::clone(&self.frontier)
    }

    /// The normalized seed URL
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the crawl to quiescence
    pub async fn run(self) -> RunResult {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Runs the crawl until quiescence or until `cancel` fires
    ///
    /// On cancellation queued tasks are dropped (and recorded as cancelled),
    /// in-flight fetches abort at their next checkpoint, and no partially
    /// written file is left under a final name.
    pub async fn run_with_cancellation(self, cancel: CancellationToken) -> RunResult {
        let start_time = Instant::now();
        let workers = self.config.workers.max(1);

        tracing::info!(
            "Starting crawl of {} with {} worker(s), destination {}",
            self.seed,
            workers,
            self.downloader.destination().display()
        );

        if self.registry.claim(&self.seed) {
            self.frontier.push(Task::Crawl(CrawlTask {
                url: self.seed.clone(),
                fetch_url: self.seed_fetch_url,
                depth: 0,
            }));
        }

        let shared = Arc::new(Worker {
            config: self.config,
            seed: self.seed,
            fetcher: self.fetcher,
            downloader: self.downloader,
            registry: self.registry,
            frontier: self.frontier,
            tally: RunTally::default(),
            cancel: cancel.clone(),
        });

        let watcher = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared.cancel.cancelled().await;
                tracing::info!("Cancellation requested, draining in-flight work");
                shared.abandon_queued();
            })
        };

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.work(id).await })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }

        watcher.abort();
        let _ = watcher.await;

        let result = shared
            .tally
            .finish(start_time.elapsed(), cancel.is_cancelled());

        tracing::info!(
            "Crawl finished: {} page(s) visited, {} file(s) downloaded, {} failure(s) in {:?}",
            result.pages_visited(),
            result.files_downloaded(),
            result.errors.len(),
            result.elapsed
        );

        result
    }
}

impl Worker {
    /// Worker loop: pop, process, complete, until the frontier reports quiescence
    ///
    /// The in-flight guard completes the task even if processing panics.
    async fn work(&self, id: usize) {
        tracing::debug!("Worker {} started", id);

        while let Some((task, _in_flight)) = self.frontier.pop_guarded().await {
            match task {
                Task::Crawl(task) => self.process_page(task).await,
                Task::Download(task) => self.process_download(task).await,
            }
        }

        tracing::debug!("Worker {} finished", id);
    }

    /// Fetches a page, extracts its links, and dispatches new work
    async fn process_page(&self, task: CrawlTask) {
        tracing::debug!("Crawling {} (depth {})", task.url, task.depth);

        let fetched = match self.fetch_with_retry(&task.fetch_url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.fail(task.url, e, false);
                return;
            }
        };

        if fetched.is_html() {
            let links = extract_references(&fetched.final_url, &fetched.body);
            tracing::debug!("Found {} link(s) on {}", links.len(), task.url);
            self.dispatch_links(links, task.depth);
        } else {
            tracing::debug!(
                "Skipping link extraction for {} (content type {:?})",
                task.url,
                fetched.content_type
            );
        }

        self.registry.mark_done(&task.url, UrlState::PageDone);
        self.tally.record_page(task.url);
    }

    /// Classifies discovered links and queues the unclaimed ones
    ///
    /// `links` are request addresses; each is claimed under its normalized form.
    fn dispatch_links(&self, links: BTreeSet<Url>, parent_depth: u32) {
        let mut ignored = 0;

        for fetch_url in links {
            let link = match normalize_parsed(fetch_url.clone()) {
                Ok(link) => link,
                Err(e) => {
                    tracing::trace!("Ignoring {}: {}", fetch_url, e);
                    ignored += 1;
                    continue;
                }
            };

            match classify_resource(&link, &self.config.accepted_types) {
                ResourceClass::Ignored => {
                    tracing::trace!("Ignoring {}", link);
                    ignored += 1;
                }

                ResourceClass::Page => {
                    if !same_site(&link, &self.seed) {
                        tracing::trace!("Ignoring off-site page {}", link);
                        ignored += 1;
                        continue;
                    }

                    let depth = parent_depth + 1;
                    if self.config.max_depth.is_some_and(|max| depth > max) {
                        tracing::trace!("Ignoring {} beyond max depth", link);
                        ignored += 1;
                        continue;
                    }

                    if self.registry.claim(&link) {
                        self.enqueue(Task::Crawl(CrawlTask {
                            url: link,
                            fetch_url,
                            depth,
                        }));
                    }
                }

                ResourceClass::File(file_type) => {
                    if self.registry.claim(&link) {
                        self.enqueue(Task::Download(DownloadTask {
                            url: link,
                            fetch_url,
                            file_type,
                        }));
                    }
                }
            }
        }

        if ignored > 0 {
            self.tally.record_ignored(ignored);
        }
    }

    /// Queues a claimed task; a closed frontier finalizes it as cancelled
    fn enqueue(&self, task: Task) {
        let is_file = matches!(task, Task::Download(_));
        let url = task.url().clone();

        if !self.frontier.push(task) {
            self.fail(url, TaskError::Cancelled, is_file);
        }
    }

    /// Fetches a file and writes it to the destination
    async fn process_download(&self, task: DownloadTask) {
        tracing::debug!("Downloading {} ({})", task.url, task.file_type);

        let fetched = match self.fetch_with_retry(&task.fetch_url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.fail(task.url, e, true);
                return;
            }
        };

        let bytes = fetched.body.len() as u64;
        let saved = self
            .downloader
            .save_with_cancellation(&task.url, fetched.body, &self.cancel)
            .await;

        match saved {
            Ok(path) => {
                tracing::info!("Downloaded {} -> {}", task.url, path.display());
                self.registry.mark_done(&task.url, UrlState::FileDone);
                self.tally.record_file(DownloadedFile {
                    url: task.url,
                    path,
                    bytes,
                });
            }
            Err(WriteError::Cancelled) => self.fail(task.url, TaskError::Cancelled, true),
            Err(e) => self.fail(task.url, TaskError::Write(e), true),
        }
    }

    /// One GET per attempt; retryable errors back off exponentially
    async fn fetch_with_retry(&self, url: &Url) -> Result<FetchedResource, TaskError> {
        let max_attempts = self.config.fetch.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TaskError::Cancelled),
                result = self.fetcher.fetch(url) => result,
            };

            match result {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.fetch.backoff(attempt);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        url,
                        e,
                        delay
                    );

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(TaskError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(source) => {
                    return Err(TaskError::Fetch {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    /// Marks a task failed and records why
    fn fail(&self, url: Url, error: TaskError, is_file: bool) {
        tracing::warn!("Failed {}: {}", url, error);
        self.registry.mark_done(&url, UrlState::Failed);
        self.tally.record_failure(url, error, is_file);
    }

    /// Closes the frontier and finalizes every task that will never run
    fn abandon_queued(&self) {
        for task in self.frontier.close() {
            let is_file = matches!(task, Task::Download(_));
            let url = match task {
                Task::Crawl(t) => t.url,
                Task::Download(t) => t.url,
            };
            self.fail(url, TaskError::Cancelled, is_file);
        }
    }
}

/// Runs a complete crawl for `config`
///
/// # Returns
///
/// * `Ok(RunResult)` - the run completed (possibly with per-URL failures)
/// * `Err(MilesError)` - the configuration was rejected before any work started
///
/// # Example
///
/// ```no_run
/// use miles::config::RunConfig;
/// use miles::crawler::run_crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = RunConfig::new("https://example.com/", "downloads");
/// config.accept_types(["jpg", "png"]);
/// let result = run_crawl(config).await?;
/// println!("{} files", result.files_downloaded());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: RunConfig) -> Result<RunResult, MilesError> {
    Ok(Coordinator::new(config)?.run().await)
}
