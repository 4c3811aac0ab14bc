use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration for one crawl run
///
/// Loaded from TOML (all keys optional) and then overridden by command-line
/// flags. Shared read-only by every worker once the run starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Page the crawl starts from
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Directory downloaded files are written to
    pub destination: PathBuf,

    /// Number of parallel workers (and runtime threads)
    pub workers: usize,

    /// Accepted file extensions, lowercase without the dot.
    /// Empty means every recognized binary type.
    #[serde(rename = "file-types")]
    pub accepted_types: BTreeSet<String>,

    /// Maximum link depth from the seed page (unbounded when absent)
    #[serde(rename = "max-depth")]
    pub max_depth: Option<u32>,

    pub fetch: FetchConfig,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total time allowed for one request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Time allowed to establish a connection (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per URL before it is marked failed
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            destination: PathBuf::from("."),
            workers: 1,
            accepted_types: BTreeSet::new(),
            max_depth: None,
            fetch: FetchConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
            retry_backoff_ms: 500,
            user_agent: format!("miles/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RunConfig {
    /// Creates a configuration for `seed_url` with default settings
    pub fn new(seed_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            seed_url: seed_url.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Adds accepted file types, normalizing `".JPG"` style input to `"jpg"`
    pub fn accept_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ty in types {
            let ty = ty.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if !ty.is_empty() {
                self.accepted_types.insert(ty);
            }
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}
