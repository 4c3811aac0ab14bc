//! File downloader - writes fetched bytes into the destination directory
//!
//! Bytes are first written to a hidden temporary file inside the
//! destination and then moved to their final name with a no-clobber rename.
//! An interrupted download therefore never leaves a truncated file under
//! the final name, and two downloads that derive the same name never
//! overwrite each other: the second one gets a `-1`, `-2`, ... suffix.

use crate::WriteError;
use percent_encoding::percent_decode_str;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Suffixes tried before giving up on a name
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Bytes written between cancellation checks
const WRITE_CHUNK: usize = 64 * 1024;

/// Longest file stem kept from a URL (bytes)
const MAX_STEM_LEN: usize = 200;

/// Writes downloaded files into one destination directory
#[derive(Debug, Clone)]
pub struct Downloader {
    destination: PathBuf,
}

impl Downloader {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Creates the destination directory if it is missing
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.destination)
    }

    /// Stores `body` under a name derived from `url`
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - final path of the written file
    /// * `Err(WriteError)` - nothing was left under a final name
    pub async fn save(&self, url: &Url, body: Vec<u8>) -> Result<PathBuf, WriteError> {
        self.save_with_cancellation(url, body, &CancellationToken::new())
            .await
    }

    /// Like [`save`](Self::save), but stops once `cancel` fires
    ///
    /// Cancellation is checked between written chunks and right before the
    /// rename. A cancelled write returns `WriteError::Cancelled` and leaves
    /// nothing in the destination.
    pub async fn save_with_cancellation(
        &self,
        url: &Url,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, WriteError> {
        let destination = self.destination.clone();
        let name = file_name_for(url);
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || write_atomically(&destination, &name, &body, &cancel))
            .await
            .map_err(|e| WriteError::Aborted(e.to_string()))?
    }
}

/// Derives a safe file name from the URL's last path segment
///
/// The segment is percent-decoded before unsafe characters are replaced.
///
/// # Example
///
/// ```
/// use miles::crawler::file_name_for;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/static/img/ostep.jpg").unwrap();
/// assert_eq!(file_name_for(&url), "ostep.jpg");
/// ```
pub fn file_name_for(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    let sanitized: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() {
        return "download".to_string();
    }

    let (stem, ext) = split_name(sanitized);
    let stem = truncate_at_char_boundary(stem, MAX_STEM_LEN);
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

/// Name for collision attempt `n` (0 is the plain name)
fn candidate_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match split_name(name) {
        (stem, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
        (stem, None) => format!("{}-{}", stem, n),
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WriteError {
    let path = path.to_path_buf();
    move |source| WriteError::Io { path, source }
}

fn write_atomically(
    destination: &Path,
    name: &str,
    body: &[u8],
    cancel: &CancellationToken,
) -> Result<PathBuf, WriteError> {
    let mut temp = tempfile::Builder::new()
        .prefix(".miles-")
        .suffix(".part")
        .tempfile_in(destination)
        .map_err(io_error(destination))?;

    // Returning early drops `temp`, which removes the partial file
    for chunk in body.chunks(WRITE_CHUNK) {
        if cancel.is_cancelled() {
            return Err(WriteError::Cancelled);
        }
        temp.write_all(chunk).map_err(io_error(temp.path()))?;
    }
    temp.flush().map_err(io_error(temp.path()))?;

    if cancel.is_cancelled() {
        return Err(WriteError::Cancelled);
    }

    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = destination.join(candidate_name(name, n));
        match temp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => temp = e.file,
            Err(e) => {
                return Err(WriteError::Io {
                    path: candidate,
                    source: e.error,
                })
            }
        }
    }

    // Dropping `temp` removes the temporary file
    Err(WriteError::NamesExhausted(name.to_string()))
}
