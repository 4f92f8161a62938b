//! Per-page results and the final output of a crawl session

use crate::crawler::transport::is_html_content_type;
use crate::output::CrawlStats;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of fetching one canonical URL
///
/// Exactly one result is recorded per fetched URL. Once recorded it is shared
/// as `Arc<CrawlResult>` and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    /// Canonical URL that was fetched
    pub url: String,

    /// Link distance from the seed (seed = 1)
    pub depth: u32,

    /// Final HTTP status, or a sentinel (408 timeout, 503 unreachable)
    pub status_code: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Absolute target of a 3xx response
    pub redirect_to: Option<String>,

    /// Page title, for HTML pages that have one
    pub title: Option<String>,

    /// Response body; `None` when the fetch failed
    pub body: Option<String>,

    /// Every error encountered, including failed attempts that were retried
    pub errors: Vec<String>,

    /// Time spent fetching, including retries but not the politeness delay
    pub elapsed: Duration,

    /// Links extracted from the page, empty for pages at the depth bound
    pub discovered_links: BTreeSet<String>,

    /// When the fetch finished
    pub completed_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Returns true for a 2xx response whose body was read
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && self.body.is_some()
    }

    /// Returns true if the response may carry HTML
    pub fn is_html(&self) -> bool {
        is_html_content_type(self.content_type.as_deref())
    }
}

/// Everything a finished session hands back to its caller
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    /// One result per fetched canonical URL, in URL order
    pub results: BTreeMap<String, Arc<CrawlResult>>,

    /// Sitemap 0.9 XML covering the successful pages
    pub sitemap: String,

    /// Summary statistics
    pub stats: CrawlStats,

    /// True if the session ended through cancellation or session timeout
    pub cancelled: bool,

    /// When the session started
    pub started_at: DateTime<Utc>,
}

impl CrawlOutput {
    /// Results with a 2xx status, in URL order
    pub fn successful(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results
            .values()
            .map(Arc::as_ref)
            .filter(|result| result.is_success())
    }
}
