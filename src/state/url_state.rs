/// Processing state definitions for claimed URLs
use std::fmt;

/// Represents the processing state of a claimed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active State =====
    /// URL has been claimed by a worker (queued or being processed)
    InProgress,

    // ===== Terminal Success States =====
    /// Page was fetched and its links extracted
    PageDone,

    /// File was fetched and written to the destination
    FileDone,

    // ===== Terminal Error State =====
    /// Fetch, write, or cancellation ended processing
    Failed,
}

impl UrlState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::PageDone | Self::FileDone)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::PageDone => "page_done",
            Self::FileDone => "file_done",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible states
    pub fn all_states() -> [Self; 4] {
        [Self::InProgress, Self::PageDone, Self::FileDone, Self::Failed]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
