//! URL handling module for Miles
//!
//! This module provides URL normalization, host comparison, and resource
//! classification (page to crawl, file to download, or ignored).

mod domain;
mod normalize;

use std::collections::BTreeSet;
use url::Url;

// Re-export main functions
pub use domain::{extract_host, same_site};
pub use normalize::{normalize_parsed, normalize_url, resolve_reference, resolve_url};

/// Extensions that name HTML pages to crawl
pub const PAGE_EXTENSIONS: &[&str] = &[
    "html", "htm", "xhtml", "shtml", "php", "asp", "aspx", "jsp", "cgi",
];

/// Binary file types downloaded when no explicit type filter is configured
pub const RECOGNIZED_FILE_TYPES: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff",
    // audio
    "mp3", "wav", "ogg", "flac", "m4a", "aac",
    // video
    "mp4", "webm", "avi", "mov", "mkv",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "epub",
    // archives
    "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "tar", "iso",
];

/// What the crawler does with a discovered URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// HTML page - fetch and extract its links
    Page,
    /// File of the given type (lowercase extension) - download it
    File(String),
    /// Anything else - dropped silently
    Ignored,
}

impl ResourceClass {
    /// Returns true if the URL should be crawled as a page
    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page)
    }

    /// Returns true if the URL should be downloaded
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Classifies a URL by the extension of its last path segment
///
/// Decision order:
/// 1. Page extension, or no extension and no query string → `Page`
/// 2. Extension in `accepted` (or, when `accepted` is empty, in
///    [`RECOGNIZED_FILE_TYPES`]) → `File`
/// 3. Everything else, including extension-less URLs that only carry a
///    query → `Ignored`
///
/// Extensions compare case-insensitively; `accepted` is expected to hold
/// lowercase entries as produced by [`RunConfig::accept_types`](crate::RunConfig::accept_types).
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use url::Url;
/// use miles::url::{classify_resource, ResourceClass};
///
/// let accepted: BTreeSet<String> = ["jpg".to_string()].into();
/// let url = Url::parse("https://example.com/img/Photo.JPG").unwrap();
/// assert_eq!(classify_resource(&url, &accepted), ResourceClass::File("jpg".into()));
/// ```
pub fn classify_resource(url: &Url, accepted: &BTreeSet<String>) -> ResourceClass {
    let extension = match file_extension(url) {
        Some(ext) => ext,
        None if url.query().is_some() => return ResourceClass::Ignored,
        None => return ResourceClass::Page,
    };

    if PAGE_EXTENSIONS.contains(&extension.as_str()) {
        return ResourceClass::Page;
    }

    let wanted = if accepted.is_empty() {
        RECOGNIZED_FILE_TYPES.contains(&extension.as_str())
    } else {
        accepted.contains(&extension)
    };

    if wanted {
        ResourceClass::File(extension)
    } else {
        ResourceClass::Ignored
    }
}

/// Returns the lowercase extension of the URL's last path segment
///
/// Dot-files (`/.htaccess`) and trailing dots have no extension.
pub fn file_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
