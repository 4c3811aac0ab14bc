//! Miles: a parallel site crawler and file downloader
//!
//! This crate crawls a single web site from a seed URL, follows its page links
//! breadth-first, and downloads every linked file of the requested types into a
//! destination directory using a fixed pool of concurrent workers.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Miles operations
#[derive(Debug, Error)]
pub enum MilesError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// Every variant is fatal: it is raised before any worker is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Cannot use destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failure of a single HTTP GET
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("not found (HTTP {status})")]
    NotFound { status: u16 },

    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("network error: {0}")]
    NetworkError(String),
}

impl FetchError {
    /// Returns true if a later attempt might succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// Failure to store a downloaded file
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no free file name left for {0}")]
    NamesExhausted(String),

    #[error("write task aborted: {0}")]
    Aborted(String),

    #[error("write cancelled")]
    Cancelled,
}

/// Why a single crawl or download task ended in the failed state
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch { attempts: u32, source: FetchError },

    #[error("{0}")]
    Write(#[from] WriteError),

    #[error("cancelled")]
    Cancelled,
}

/// Result type alias for Miles operations
pub type Result<T> = std::result::Result<T, MilesError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::RunConfig;
pub use crawler::{run_crawl, Coordinator};
pub use output::{FailedUrl, RunResult};
pub use state::UrlState;
pub use url::{classify_resource, normalize_url, ResourceClass};
