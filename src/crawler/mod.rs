//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The deduplicating frontier shared by the workers
//! - HTTP fetching with retry logic behind a swappable transport
//! - HTML parsing and link extraction
//! - Session orchestration over a bounded worker pool

mod fetcher;
mod frontier;
mod parser;
mod result;
mod session;
mod sink;
mod transport;

pub use fetcher::{FetchOutcome, Fetcher};
pub use frontier::{CompletionGuard, CrawlTask, Frontier};
pub use parser::{extract_links, parse_html, resolve_redirect, ParsedPage};
pub use result::{CrawlOutput, CrawlResult};
pub use session::CrawlSession;
pub use sink::{CrawlProgress, LogProgressSink, PageSink, ProgressSink};
pub use transport::{
    is_html_content_type, HttpTransport, ReqwestTransport, TransportError, TransportResponse,
    STATUS_TIMEOUT, STATUS_UNAVAILABLE,
};

use crate::config::Config;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and seed
/// 2. Build the HTTP client
/// 3. Crawl until the frontier is idle, the page budget is spent, or `cancel` fires
/// 4. Return the results with their sitemap and statistics
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Cancels the crawl; pages recorded so far are still returned
///
/// # Returns
///
/// * `Ok(CrawlOutput)` - Crawl finished or was cancelled
/// * `Err(RippleError)` - Invalid configuration
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<CrawlOutput> {
    let mut session = CrawlSession::new(config.crawler, &config.user_agent)?;
    session.run(cancel).await
}
