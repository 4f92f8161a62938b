//! Observation points for crawl output
//!
//! A [`PageSink`] receives each recorded page, for persistence or indexing
//! outside the crawler. A [`ProgressSink`] receives periodic counters.
//! Neither can influence the crawl: sink failures are logged and dropped.

use crate::crawler::CrawlResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives every recorded page
///
/// Each call runs on its own task, so a slow sink never stalls the workers.
/// Calls may arrive out of order and concurrently.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Handles one recorded page
    async fn on_page(&self, result: Arc<CrawlResult>) -> anyhow::Result<()>;
}

/// Snapshot of crawl progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlProgress {
    /// Pages fetched and recorded so far
    pub pages_completed: usize,

    /// Pages waiting in the frontier
    pub pages_queued: usize,

    /// Pages currently being fetched
    pub pages_in_flight: usize,
}

/// Receives progress snapshots
///
/// Called synchronously from a worker; implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: CrawlProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(CrawlProgress) + Send + Sync,
{
    fn on_progress(&self, progress: CrawlProgress) {
        self(progress)
    }
}

/// Default progress sink: writes each snapshot to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_progress(&self, progress: CrawlProgress) {
        tracing::info!(
            "Progress: {} pages crawled, {} queued, {} in flight",
            progress.pages_completed,
            progress.pages_queued,
            progress.pages_in_flight
        );
    }
}
