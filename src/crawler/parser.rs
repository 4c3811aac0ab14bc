//! HTML link extraction
//!
//! This module turns a fetched HTML document into the set of absolute,
//! normalized URLs it references:
//! - Navigation links (`<a>`, `<area>`, `<link>`)
//! - Embedded resources (`<img>`, `<source>`, `<audio>`, `<video>`, ...)
//! - `srcset` candidates
//!
//! Parsing is best-effort. A reference that cannot be resolved is skipped
//! on its own; it never fails the page.
//!
//! [`extract_references`] keeps each URL in the form it must be requested
//! in; [`extract_links`] returns the normalized identities.

use crate::url::{normalize_parsed, resolve_reference};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// `(selector, attribute)` pairs that carry references
const REFERENCE_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("source[src]", "src"),
    ("audio[src]", "src"),
    ("video[src]", "src"),
    ("video[poster]", "poster"),
    ("embed[src]", "src"),
    ("iframe[src]", "src"),
    ("frame[src]", "src"),
    ("track[src]", "src"),
];

/// Extracts every URL referenced by an HTML document
///
/// Relative references resolve against `<base href>` when present, otherwise
/// against `page_url`. Results are normalized and deduplicated.
///
/// Content that is clearly not markup yields an empty set.
///
/// # Example
///
/// ```
/// use miles::crawler::extract_links;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/docs/").unwrap();
/// let html = br#"<a href="intro">Intro</a><img src="/logo.png"><a href="intro#top">again</a>"#;
/// let links = extract_links(&page, html);
/// assert_eq!(links.len(), 2);
/// ```
pub fn extract_links(page_url: &Url, html: &[u8]) -> BTreeSet<Url> {
    extract_references(page_url, html)
        .into_iter()
        .filter_map(|url| normalize_parsed(url).ok())
        .collect()
}

/// Extracts every URL referenced by an HTML document, ready to be requested
///
/// References are resolved the same way as in [`extract_links`], but only
/// the fragment is stripped: trailing slashes and query order are kept.
pub fn extract_references(page_url: &Url, html: &[u8]) -> BTreeSet<Url> {
    let mut links = BTreeSet::new();

    if !html.contains(&b'<') {
        return links;
    }

    let text = String::from_utf8_lossy(html);
    let document = Html::parse_document(&text);
    let base = document_base(&document, page_url);

    for (selector, attr) in REFERENCE_SOURCES {
        let selector = match Selector::parse(selector) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!("Invalid selector {}: {:?}", selector, e);
                continue;
            }
        };

        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                if let Some(url) = resolve_link(value, &base) {
                    links.insert(url);
                }
            }
        }
    }

    if let Ok(srcset_selector) = Selector::parse("img[srcset], source[srcset]") {
        for element in document.select(&srcset_selector) {
            if let Some(srcset) = element.value().attr("srcset") {
                for candidate in parse_srcset(srcset) {
                    if let Some(url) = resolve_link(candidate, &base) {
                        links.insert(url);
                    }
                }
            }
        }
    }

    links
}

/// Returns the resolution base: `<base href>` if valid, else the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Splits a `srcset` value into its URL candidates
fn parse_srcset(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

/// Resolves a reference to an absolute URL without its fragment
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Fragment-only references (same page anchors)
/// - Unparsable references
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match resolve_reference(base, href) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::trace!("Skipping reference {:?}: {}", href, e);
            None
        }
    }
}
