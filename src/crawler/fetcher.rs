//! Page fetcher
//!
//! Fetches one task through the [`HttpTransport`], applying the politeness
//! delay first and retrying transient failures with exponential backoff.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | 2xx | Record body |
//! | 3xx with Location | Record status and redirect target, no retry |
//! | Any other status | Record status, no retry |
//! | Timeout | Retry up to `max_retries` times, then record 408 |
//! | Connection failure | Retry up to `max_retries` times, then record 503 |
//! | Other request error | Record 503, no retry |
//! | Cancellation | Abandon, nothing recorded |

use crate::crawler::{CrawlResult, CrawlTask, HttpTransport, TransportError, TransportResponse};
use chrono::Utc;
use reqwest::StatusCode;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of a fetch attempt sequence
#[derive(Debug)]
pub enum FetchOutcome {
    /// The fetch finished, successfully or not, and should be recorded
    Completed(CrawlResult),

    /// Cancellation interrupted the fetch; nothing should be recorded
    Cancelled,
}

/// Fetches pages on behalf of the workers
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `transport` - The HTTP transport to use
    /// * `user_agent` - User agent sent with every request
    /// * `timeout` - Per-request timeout
    /// * `max_retries` - Extra attempts allowed for transient failures
    /// * `retry_backoff` - Wait before the first retry; doubles per retry
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        user_agent: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
            timeout,
            max_retries,
            retry_backoff,
        }
    }

    /// Fetches a task after waiting `delay`
    ///
    /// The returned result has no title and no discovered links; the caller
    /// fills those in after parsing.
    pub async fn fetch(
        &self,
        task: &CrawlTask,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        if !delay.is_zero() && !sleep_or_cancel(delay, cancel).await {
            return FetchOutcome::Cancelled;
        }

        let started = Instant::now();
        let mut errors = Vec::new();
        let mut attempt: u32 = 0;

        let response = loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return FetchOutcome::Cancelled,
                result = self.transport.get(&task.fetch_url, &self.user_agent, self.timeout) => result,
            };

            match result {
                Ok(response) => break Ok(response),
                Err(e) => {
                    errors.push(format!("{} for {} (attempt {})", e, task.url, attempt + 1));

                    if e.is_transient() && attempt < self.max_retries {
                        let backoff = self.backoff_for(attempt);
                        tracing::debug!(
                            "Retrying {} in {:?} after: {}",
                            task.url,
                            backoff,
                            e
                        );
                        if !sleep_or_cancel(backoff, cancel).await {
                            return FetchOutcome::Cancelled;
                        }
                        attempt += 1;
                        continue;
                    }

                    break Err(e);
                }
            }
        };

        let result = match response {
            Ok(response) => Self::from_response(task, response, errors, started.elapsed()),
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", task.url, e);
                Self::from_error(task, &e, errors, started.elapsed())
            }
        };

        FetchOutcome::Completed(result)
    }

    /// Backoff before retry number `attempt + 1`
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    fn from_response(
        task: &CrawlTask,
        response: TransportResponse,
        mut errors: Vec<String>,
        elapsed: Duration,
    ) -> CrawlResult {
        let mut redirect_to = None;
        let body = if response.is_success() {
            Some(response.body.unwrap_or_default())
        } else if response.is_redirect() {
            redirect_to = response
                .location
                .as_deref()
                .and_then(|location| Url::parse(&task.fetch_url).ok()?.join(location).ok())
                .map(String::from);
            tracing::debug!(
                "HTTP {} for {} redirects to {:?}",
                response.status,
                task.fetch_url,
                redirect_to
            );
            None
        } else {
            let reason = StatusCode::from_u16(response.status)
                .ok()
                .and_then(|status| status.canonical_reason())
                .unwrap_or("Unknown");
            let message = format!("HTTP {} {} for {}", response.status, reason, task.url);
            tracing::warn!("{}", message);
            errors.push(message);
            None
        };

        CrawlResult {
            url: task.url.clone(),
            depth: task.depth,
            status_code: response.status,
            content_type: response.content_type,
            redirect_to,
            title: None,
            body,
            errors,
            elapsed,
            discovered_links: BTreeSet::new(),
            completed_at: Utc::now(),
        }
    }

    fn from_error(
        task: &CrawlTask,
        error: &TransportError,
        errors: Vec<String>,
        elapsed: Duration,
    ) -> CrawlResult {
        CrawlResult {
            url: task.url.clone(),
            depth: task.depth,
            status_code: error.status_code(),
            content_type: None,
            redirect_to: None,
            title: None,
            body: None,
            errors,
            elapsed,
            discovered_links: BTreeSet::new(),
            completed_at: Utc::now(),
        }
    }
}

/// Sleeps for `duration`; returns false if cancelled first
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
