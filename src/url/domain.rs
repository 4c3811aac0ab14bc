use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use miles::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same site (host and port)
///
/// Only pages on the seed's site are crawled; files may live anywhere.
pub fn same_site(a: &Url, b: &Url) -> bool {
    extract_host(a) == extract_host(b) && a.port_or_known_default() == b.port_or_known_default()
}
