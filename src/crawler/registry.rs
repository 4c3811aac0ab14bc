//! Visited registry - the run's dedup ledger
//!
//! Every URL enters the crawl through [`VisitedRegistry::claim`]. The
//! check-and-insert happens under one lock acquisition, so two workers can
//! never both own the same URL. Entries are never removed during a run.

use crate::state::UrlState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Concurrency-safe map from normalized URL to processing state
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    entries: Mutex<HashMap<String, UrlState>>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims `url` for processing
    ///
    /// # Returns
    ///
    /// * `true` - the URL was unseen; it is now `InProgress` and the caller owns it
    /// * `false` - the URL was already claimed or finished by someone else
    pub fn claim(&self, url: &Url) -> bool {
        use std::collections::hash_map::Entry;

        match self.lock().entry(url.as_str().to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(UrlState::InProgress);
                true
            }
        }
    }

    /// Records the outcome of processing a claimed URL
    ///
    /// Repeating the same terminal state is a no-op. Replacing one terminal
    /// state with a different one panics in debug builds and is
    /// last-write-wins in release builds.
    pub fn mark_done(&self, url: &Url, outcome: UrlState) {
        let mut entries = self.lock();
        let previous = entries.insert(url.as_str().to_owned(), outcome);

        match previous {
            Some(prev) if prev.is_terminal() && prev != outcome => {
                // Release the lock before a debug panic so other workers
                // do not observe a poisoned registry.
                drop(entries);
                if cfg!(debug_assertions) {
                    panic!(
                        "{} already finished as {}, cannot become {}",
                        url, prev, outcome
                    );
                }
                tracing::warn!(
                    "Conflicting outcome for {}: {} replaced by {}",
                    url,
                    prev,
                    outcome
                );
            }
            None => {
                tracing::warn!("Marked {} as {} without a prior claim", url, outcome);
            }
            _ => {}
        }
    }

    /// Returns the current state of `url`, if it was ever claimed
    pub fn state(&self, url: &Url) -> Option<UrlState> {
        self.lock().get(url.as_str()).copied()
    }

    /// Number of URLs claimed during the run
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of URLs currently in `state`
    pub fn count(&self, state: UrlState) -> usize {
        self.lock().values().filter(|s| **s == state).count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UrlState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
