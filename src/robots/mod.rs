//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites.

mod cache;
mod parser;

pub use cache::RobotsPolicy;
pub use parser::RobotsRuleSet;

use crate::crawler::HttpTransport;
use std::time::Duration;
use url::Url;

/// Builds the robots.txt URL for the origin of `url`
///
/// # Examples
///
/// ```
/// use ripplemap::robots::robots_url;
/// use url::Url;
///
/// let page = Url::parse("http://127.0.0.1:8080/docs/page?x=1").unwrap();
/// assert_eq!(robots_url(&page).unwrap().as_str(), "http://127.0.0.1:8080/robots.txt");
/// ```
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    url.join("/robots.txt").ok()
}

/// Redirect hops followed when fetching robots.txt
const MAX_ROBOTS_REDIRECTS: usize = 5;

/// Fetches robots.txt for the origin of `url`
///
/// Redirects are followed for up to five hops, so an `http` origin that
/// redirects to `https` still gets its rules.
///
/// # Returns
///
/// * `Some(String)` - The robots.txt body (2xx response)
/// * `None` - No usable robots.txt: error status, transport failure, timeout,
///   or too many redirects
pub async fn fetch_robots(
    transport: &dyn HttpTransport,
    url: &Url,
    user_agent: &str,
    timeout: Duration,
) -> Option<String> {
    let mut robots_url = robots_url(url)?;

    for _ in 0..=MAX_ROBOTS_REDIRECTS {
        match transport.get(robots_url.as_str(), user_agent, timeout).await {
            Ok(response) if response.is_success() => return response.body,
            Ok(response) if response.is_redirect() => {
                let location = response.location.as_deref().unwrap_or_default();
                let next = robots_url.join(location).ok()?;
                tracing::debug!("robots.txt at {} redirects to {}", robots_url, next);
                robots_url = next;
            }
            Ok(response) => {
                tracing::debug!("robots.txt at {} returned HTTP {}", robots_url, response.status);
                return None;
            }
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", robots_url, e);
                return None;
            }
        }
    }

    tracing::debug!("Too many redirects fetching robots.txt for {}", url);
    None
}
