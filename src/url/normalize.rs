use url::Url;

/// Normalizes a URL string into its canonical frontier key
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse the URL
/// 2. Keep only `scheme://host[:port]path`; userinfo and fragment are dropped
/// 3. Lowercase the host (the `url` crate does this for http/https); path
///    and query keep their case
/// 4. Strip trailing slashes from the path, so `/docs/` and `/docs` collapse
///    and the root becomes the bare origin
/// 5. Keep the query string unmodified; an empty `?` is dropped
///
/// Never fails. Input that does not parse as a URL with a host falls back to
/// the trimmed, lowercased input with trailing slashes stripped.
///
/// # Examples
///
/// ```
/// use ripplemap::url::normalize_url;
///
/// assert_eq!(normalize_url("https://EXAMPLE.com/Docs/"), "https://example.com/Docs");
/// assert_eq!(normalize_url("https://example.com/a?b=1#top"), "https://example.com/a?b=1");
/// assert_eq!(normalize_url("  Not A URL/ "), "not a url");
/// ```
pub fn normalize_url(url_str: &str) -> String {
    let trimmed = url_str.trim();

    match Url::parse(trimmed) {
        Ok(url) if url.host_str().is_some() => canonical_form(&url),
        _ => fallback_form(trimmed),
    }
}

fn canonical_form(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();

    let mut canonical = format!("{}://{}", url.scheme(), host);

    // Url::port() is None when the port is the scheme default
    if let Some(port) = url.port() {
        canonical.push(':');
        canonical.push_str(&port.to_string());
    }

    canonical.push_str(url.path().trim_end_matches('/'));

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(query);
    }

    canonical
}

fn fallback_form(input: &str) -> String {
    input.to_lowercase().trim_end_matches('/').to_string()
}
