//! URL handling module for Ripplemap
//!
//! This module provides URL normalization, seed validation, domain extraction,
//! and crawlable-content filtering.

mod domain;
mod filter;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{domain_key, extract_domain, same_host};
pub use filter::{has_blocked_extension, is_admin_path, is_crawlable, is_root_path};
pub use normalize::normalize_url;

/// Parses and validates a seed URL
///
/// A seed must parse, use the `http` or `https` scheme, and carry a host.
///
/// # Examples
///
/// ```
/// use ripplemap::url::parse_seed_url;
///
/// assert!(parse_seed_url("https://example.com/").is_ok());
/// assert!(parse_seed_url("ftp://example.com/").is_err());
/// assert!(parse_seed_url("example.com").is_err());
/// ```
pub fn parse_seed_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
