use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripplemap::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Key under which per-domain state (robots rules) is cached
///
/// The host plus any explicit non-default port, so two servers on the same
/// machine keep separate robots.txt files.
pub fn domain_key(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", domain, port),
        None => domain,
    })
}

/// Returns true if both URLs point at the same host, ignoring case
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
