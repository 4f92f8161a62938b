//! Per-session robots.txt cache
//!
//! Each domain's robots.txt is fetched at most once per session. Concurrent
//! callers for the same domain share a single in-flight fetch.

use crate::crawler::HttpTransport;
use crate::robots::{fetch_robots, RobotsRuleSet};
use crate::url::domain_key;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Longest crawl-delay honored, in seconds
const MAX_CRAWL_DELAY_SECS: f64 = 60.0;

/// Memoized robots.txt policy for one crawl session
pub struct RobotsPolicy {
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
    robots_token: String,
    timeout: Duration,
    rules: Mutex<HashMap<String, Arc<OnceCell<RobotsRuleSet>>>>,
}

impl RobotsPolicy {
    /// Creates an empty policy
    ///
    /// # Arguments
    ///
    /// * `transport` - HTTP transport used to fetch robots.txt
    /// * `user_agent` - User-Agent header sent with the request
    /// * `robots_token` - Crawler name matched against `User-agent` groups
    /// * `timeout` - Timeout for each robots.txt request
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        user_agent: impl Into<String>,
        robots_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
            robots_token: robots_token.into(),
            timeout,
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Loads robots.txt for the URL's domain if it hasn't been loaded yet
    ///
    /// Fetch failures, non-2xx responses, and cancellation all leave the
    /// domain fully allowed; a missing robots.txt never blocks a crawl.
    pub async fn ensure_loaded(&self, url: &Url, cancel: &CancellationToken) {
        let Some(key) = domain_key(url) else {
            return;
        };

        let cell = {
            let mut rules = self.rules.lock();
            Arc::clone(rules.entry(key.clone()).or_default())
        };

        cell.get_or_init(|| async {
            let content = tokio::select! {
                _ = cancel.cancelled() => None,
                content = fetch_robots(self.transport.as_ref(), url, &self.user_agent, self.timeout) => content,
            };

            match content {
                Some(text) => {
                    let rules = RobotsRuleSet::parse(key.clone(), &text, &self.robots_token);
                    tracing::debug!(
                        "Loaded robots.txt for {} ({} disallow rules)",
                        key,
                        rules.disallow_patterns().len()
                    );
                    rules
                }
                None => {
                    tracing::debug!("No usable robots.txt for {}, allowing all", key);
                    RobotsRuleSet::allow_all(key.clone())
                }
            }
        })
        .await;
    }

    /// Checks whether the URL may be fetched
    ///
    /// Domains whose robots.txt has not been loaded are allowed.
    pub fn is_allowed(&self, url: &Url) -> bool {
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        self.with_rules(url, |rules| rules.is_allowed(&path))
            .unwrap_or(true)
    }

    /// Crawl-delay declared for this crawler on the URL's domain
    pub fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.with_rules(url, RobotsRuleSet::crawl_delay)
            .flatten()
            .map(|secs| Duration::from_secs_f64(secs.min(MAX_CRAWL_DELAY_SECS)))
    }

    fn with_rules<T>(&self, url: &Url, f: impl FnOnce(&RobotsRuleSet) -> T) -> Option<T> {
        let key = domain_key(url)?;
        let cell = self.rules.lock().get(&key).cloned()?;
        cell.get().map(f)
    }
}
