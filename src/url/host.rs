use url::Url;

/// Extracts the lower-cased host from a URL string
///
/// The host is the authority portion between `://` and the next `/` or `:`,
/// always lower-cased. Ports are not part of the host.
///
/// # Arguments
///
/// * `url` - The URL string to extract the host from
///
/// # Returns
///
/// * `Some(String)` - The lower-cased host
/// * `None` - If the URL is malformed or has no host
///
/// # Examples
///
/// ```
/// use inkcrawl::url::host_of;
///
/// assert_eq!(host_of("https://Example.COM/path"), Some("example.com".to_string()));
/// assert_eq!(host_of("https://example.com:8080/x"), Some("example.com".to_string()));
/// assert_eq!(host_of("not a url"), None);
/// ```
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Extracts the authority (host plus non-default port) from a URL string
///
/// Used as the robots.txt cache key so the fetch targets the right origin;
/// everywhere else the bare host from [`host_of`] is the key.
pub fn authority_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    match parsed.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Extracts the path component of a URL, defaulting to `/`
pub fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| "/".to_string())
}

/// Checks whether two URLs share the same lower-cased host
///
/// # Examples
///
/// ```
/// use inkcrawl::url::same_host;
///
/// assert!(same_host("https://a.test/x", "https://A.TEST/y"));
/// assert!(!same_host("https://a.test/x", "https://b.test/x"));
/// ```
pub fn same_host(a: &str, b: &str) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(ha), Some(hb)) => ha == hb,
        _ => false,
    }
}

/// Checks whether a string parses as an absolute HTTP or HTTPS URL
pub fn is_valid_http_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            (parsed.scheme() == "http" || parsed.scheme() == "https")
                && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}
