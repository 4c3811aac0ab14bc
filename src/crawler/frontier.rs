//! Frontier - the shared work queue for crawl and download tasks
//!
//! This module handles:
//! - FIFO queueing of tasks (breadth-first discovery order)
//! - Tracking how many popped tasks are still in flight
//! - Detecting global quiescence (empty queue and nothing in flight)
//! - Closing the queue on cancellation
//!
//! A popped task counts as in flight until [`Frontier::complete`] is called
//! for it. A worker must push every task it discovers before completing the
//! task it is processing; otherwise another worker could observe an empty
//! queue with nothing in flight and shut down early.
//!
//! Workers use [`Frontier::pop_guarded`], whose [`InFlight`] guard completes
//! the task when dropped, so a task that panics still leaves the run able
//! to drain.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// A page URL waiting to be fetched and parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized page URL, the key in the visited registry
    pub url: Url,

    /// Address as discovered (fragment stripped); this is what gets requested
    pub fetch_url: Url,

    /// Number of links followed from the seed page
    pub depth: u32,
}

/// A file URL waiting to be fetched and written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Normalized file URL, the key in the visited registry
    pub url: Url,

    /// Address as discovered (fragment stripped); this is what gets requested
    pub fetch_url: Url,

    /// Lowercase file extension the URL was classified under
    pub file_type: String,
}

/// One unit of work for the shared worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Crawl(CrawlTask),
    Download(DownloadTask),
}

impl Task {
    /// Normalized identity of the task's URL
    pub fn url(&self) -> &Url {
        match self {
            Self::Crawl(task) => &task.url,
            Self::Download(task) => &task.url,
        }
    }

    pub fn fetch_url(&self) -> &Url {
        match self {
            Self::Crawl(task) => &task.fetch_url,
            Self::Download(task) => &task.fetch_url,
        }
    }
}

/// Completes one popped task when dropped
#[must_use = "dropping the guard completes the task immediately"]
#[derive(Debug)]
pub struct InFlight<'a> {
    frontier: &'a Frontier,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<Task>,
    in_flight: usize,
    closed: bool,
}

/// Concurrency-safe FIFO with quiescence detection
///
/// All operations are indivisible; callers never manage locks.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a task
    ///
    /// Only call this after the task's URL was successfully claimed in the
    /// visited registry.
    ///
    /// # Returns
    ///
    /// `false` if the frontier was closed and the task was dropped
    pub fn push(&self, task: Task) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.queue.push_back(task);
        }
        self.notify.notify_waiters();
        true
    }

    /// Takes the oldest task, waiting while other tasks are still in flight
    ///
    /// # Returns
    ///
    /// * `Some(Task)` - a task now owned by the caller (call [`complete`](Self::complete) when done)
    /// * `None` - the run is quiescent or the frontier was closed
    pub async fn pop(&self) -> Option<Task> {
        loop {
            // Registered before the state check so a wakeup between the
            // check and the await is not lost.
            let notified = self.notify.notified();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
                if state.in_flight == 0 {
                    drop(state);
                    // Let every other idle worker see quiescence too
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Takes the oldest task together with a guard that completes it
    ///
    /// Same waiting rules as [`pop`](Self::pop). Hold the guard until the
    /// task, including every push it performs, is finished.
    pub async fn pop_guarded(&self) -> Option<(Task, InFlight<'_>)> {
        let task = self.pop().await?;
        Some((task, InFlight { frontier: self }))
    }

    /// Marks one popped task as finished
    pub fn complete(&self) {
        let quiescent = {
            let mut state = self.lock();
            debug_assert!(state.in_flight > 0, "complete() without a matching pop()");
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.queue.is_empty()
        };

        if quiescent {
            self.notify.notify_waiters();
        }
    }

    /// Stops dispatching and returns the tasks that will never run
    ///
    /// Waiting and future [`pop`](Self::pop) calls return `None`; tasks already
    /// in flight are unaffected.
    pub fn close(&self) -> Vec<Task> {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            state.queue.drain(..).collect()
        };
        self.notify.notify_waiters();
        dropped
    }

    /// Returns true when the queue is empty and no task is in flight
    pub fn is_quiescent(&self) -> bool {
        let state = self.lock();
        state.queue.is_empty() && state.in_flight == 0
    }

    /// Number of popped tasks not yet completed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
