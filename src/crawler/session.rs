//! Crawl session - main crawl orchestration logic
//!
//! A session owns one crawl from seed to sitemap:
//! - Validating the request and seeding the frontier
//! - Running a bounded pool of workers over the shared frontier
//! - Applying robots.txt rules and the politeness delay
//! - Recording results and handing them to the sinks
//! - Building the sitemap and statistics once every worker has exited

use crate::config::{
    validate_crawler_config, validate_user_agent_config, CrawlerConfig, UserAgentConfig,
};
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::parser::{parse_html, resolve_redirect};
use crate::crawler::sink::{CrawlProgress, LogProgressSink, PageSink, ProgressSink};
use crate::crawler::transport::{HttpTransport, ReqwestTransport};
use crate::crawler::{CrawlOutput, CrawlResult};
use crate::output::{build_sitemap, CrawlStats};
use crate::robots::RobotsPolicy;
use crate::state::SessionState;
use crate::url::{normalize_url, parse_seed_url};
use crate::{RippleError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Redirects followed in place for one canonical URL
const MAX_REDIRECTS: u32 = 10;

/// A single crawl from one seed URL
///
/// # Example
///
/// ```no_run
/// use ripplemap::config::{CrawlerConfig, UserAgentConfig};
/// use ripplemap::CrawlSession;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> ripplemap::Result<()> {
/// let user_agent = UserAgentConfig {
///     crawler_name: "Ripplemap".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let mut session = CrawlSession::new(CrawlerConfig::new("https://example.com/"), &user_agent)?;
/// let output = session.run(CancellationToken::new()).await?;
/// println!("{} pages, sitemap:\n{}", output.results.len(), output.sitemap);
/// # Ok(())
/// # }
/// ```
pub struct CrawlSession {
    config: CrawlerConfig,
    user_agent: String,
    robots_token: String,
    seed: Url,
    transport: Arc<dyn HttpTransport>,
    page_sink: Option<Arc<dyn PageSink>>,
    progress_sink: Arc<dyn ProgressSink>,
    state: SessionState,
}

impl CrawlSession {
    /// Creates a session for the given crawl request
    ///
    /// Validates the configuration and seed immediately, so configuration
    /// errors surface here rather than partway through a crawl.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSession)` - A session ready to run
    /// * `Err(RippleError)` - Invalid configuration or seed, or the HTTP
    ///   client could not be built
    pub fn new(config: CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self> {
        validate_crawler_config(&config)?;
        validate_user_agent_config(user_agent)?;
        let seed = parse_seed_url(&config.seed_url)?;

        Ok(Self {
            config,
            user_agent: user_agent.header_value(),
            robots_token: user_agent.crawler_name.clone(),
            seed,
            transport: Arc::new(ReqwestTransport::new()?),
            page_sink: None,
            progress_sink: Arc::new(LogProgressSink),
            state: SessionState::NotStarted,
        })
    }

    /// Replaces the HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Sets a sink that receives every recorded page
    pub fn with_page_sink(mut self, sink: Arc<dyn PageSink>) -> Self {
        self.page_sink = Some(sink);
        self
    }

    /// Replaces the default logging progress sink
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = sink;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The validated seed URL
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// The User-Agent header sent with every request
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(RippleError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        tracing::debug!("Session state: {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Runs the crawl to completion
    ///
    /// The crawl ends when the frontier is idle, the page budget is spent,
    /// `cancel` fires, or the optional session timeout elapses. Cancellation
    /// is not an error: the pages recorded so far are returned with
    /// `cancelled` set.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutput)` - Results, sitemap, and statistics
    /// * `Err(RippleError::InvalidTransition)` - The session was already run
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<CrawlOutput> {
        self.transition(SessionState::Running)?;

        let started_at = Utc::now();
        let start_time = Instant::now();
        let cancel = cancel.child_token();

        tracing::info!(
            "Starting crawl of {} (max {} pages, depth {}, {} workers)",
            self.seed,
            self.config.max_pages,
            self.config.max_depth,
            self.config.worker_count
        );

        let timer = self.config.session_timeout().map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!("Session timeout of {:?} reached, stopping crawl", timeout);
                cancel.cancel();
            })
        });

        let shared = Arc::new(SessionShared::new(self));
        shared.seed(&self.seed, &cancel).await;

        let mut workers = JoinSet::new();
        for id in 0..self.config.worker_count {
            let shared = Arc::clone(&shared);
            let cancel = cancel.clone();
            workers.spawn(shared.worker(id, cancel));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }
        let cancelled = cancel.is_cancelled();
        shared.frontier.close();
        shared.drain_page_sink().await;
        shared.report_progress();

        let results = std::mem::take(&mut *shared.results.lock());
        let sitemap = build_sitemap(results.values().map(Arc::as_ref), started_at.date_naive());
        let stats = CrawlStats::from_results(&results, start_time.elapsed());

        self.transition(SessionState::Completed)?;

        if cancelled {
            tracing::info!("Crawl cancelled after {} pages", results.len());
        } else {
            tracing::info!(
                "Crawl complete: {} pages in {:.2}s",
                results.len(),
                stats.duration.as_secs_f64()
            );
        }

        Ok(CrawlOutput {
            results,
            sitemap,
            stats,
            cancelled,
            started_at,
        })
    }
}

/// State shared by every worker of a running session
struct SessionShared {
    max_depth: u32,
    request_delay: std::time::Duration,
    progress_interval: usize,
    frontier: Frontier,
    fetcher: Fetcher,
    robots: Option<RobotsPolicy>,
    results: Mutex<BTreeMap<String, Arc<CrawlResult>>>,
    completed: AtomicUsize,
    page_sink: Option<Arc<dyn PageSink>>,
    progress_sink: Arc<dyn ProgressSink>,
    sink_tasks: Mutex<JoinSet<()>>,
}

impl SessionShared {
    fn new(session: &CrawlSession) -> Self {
        let config = &session.config;

        let robots = config.respect_robots_txt.then(|| {
            RobotsPolicy::new(
                Arc::clone(&session.transport),
                session.user_agent.clone(),
                session.robots_token.clone(),
                config.request_timeout(),
            )
        });

        Self {
            max_depth: config.max_depth,
            request_delay: config.request_delay(),
            progress_interval: config.progress_interval,
            frontier: Frontier::new(config.max_pages),
            fetcher: Fetcher::new(
                Arc::clone(&session.transport),
                session.user_agent.clone(),
                config.request_timeout(),
                config.max_retries,
                config.retry_backoff(),
            ),
            robots,
            results: Mutex::new(BTreeMap::new()),
            completed: AtomicUsize::new(0),
            page_sink: session.page_sink.clone(),
            progress_sink: Arc::clone(&session.progress_sink),
            sink_tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Queues the seed at depth 1 unless robots.txt forbids it
    async fn seed(&self, seed: &Url, cancel: &CancellationToken) {
        if !self.is_allowed(seed, cancel).await {
            tracing::warn!("Seed {} is disallowed by robots.txt, nothing to crawl", seed);
            return;
        }

        self.frontier.enqueue(seed.as_str(), 1);
    }

    /// Loads robots.txt for the URL's domain if needed and checks the URL
    async fn is_allowed(&self, url: &Url, cancel: &CancellationToken) -> bool {
        match &self.robots {
            Some(robots) => {
                robots.ensure_loaded(url, cancel).await;
                robots.is_allowed(url)
            }
            None => true,
        }
    }

    async fn worker(self: Arc<Self>, id: usize, cancel: CancellationToken) {
        tracing::trace!("Worker {} started", id);

        while let Some(task) = self.frontier.next(&cancel).await {
            let _slot = self.frontier.completion_guard();
            self.process(task, &cancel).await;
        }

        tracing::trace!("Worker {} finished", id);
    }

    /// Fetches one task, records it, and queues the links it discovered
    async fn process(&self, task: CrawlTask, cancel: &CancellationToken) {
        let page_url = match Url::parse(&task.fetch_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping unparsable URL {}: {}", task.fetch_url, e);
                return;
            }
        };

        let delay = self
            .robots
            .as_ref()
            .and_then(|robots| robots.crawl_delay(&page_url))
            .map_or(self.request_delay, |crawl_delay| crawl_delay.max(self.request_delay));

        tracing::debug!("Fetching {} (depth {})", task.fetch_url, task.depth);
        let mut result = match self.fetcher.fetch(&task, delay, cancel).await {
            FetchOutcome::Completed(result) => result,
            FetchOutcome::Cancelled => {
                tracing::debug!("Fetch of {} cancelled", task.url);
                return;
            }
        };

        if result.is_success() && result.is_html() {
            let parsed = parse_html(result.body.as_deref().unwrap_or_default(), &page_url);
            result.title = parsed.title;
            if task.depth < self.max_depth {
                result.discovered_links = parsed.links;
            }
        }

        let redirect = result
            .redirect_to
            .as_deref()
            .and_then(|target| resolve_redirect(target, &page_url));
        if result.redirect_to.is_some() && redirect.is_none() {
            tracing::debug!(
                "Not following redirect from {} to {:?}",
                task.fetch_url,
                result.redirect_to
            );
        }

        if let Some(target) = &redirect {
            if self.refetch_in_place(&task, target, cancel).await {
                return;
            }
        }

        let result = Arc::new(result);
        self.record(Arc::clone(&result));

        // A redirect target takes the place of the page that named it
        if let Some(target) = redirect {
            self.enqueue_link(&target, task.depth, cancel).await;
        }

        for link in &result.discovered_links {
            self.enqueue_link(link, task.depth + 1, cancel).await;
        }
    }

    /// Requeues a task whose redirect keeps its canonical URL
    ///
    /// Handles `/docs` redirecting to `/docs/`: the target is already in the
    /// seen set, so it is fetched again under the same key and only the final
    /// response is recorded. Returns false if the redirect should be recorded
    /// as is (different key, loop, hop limit, or disallowed target).
    async fn refetch_in_place(
        &self,
        task: &CrawlTask,
        target: &str,
        cancel: &CancellationToken,
    ) -> bool {
        if normalize_url(target) != task.url || target == task.fetch_url {
            return false;
        }

        if task.redirects >= MAX_REDIRECTS {
            tracing::warn!("Too many redirects for {}, giving up", task.url);
            return false;
        }

        let Ok(target_url) = Url::parse(target) else {
            return false;
        };
        if !self.is_allowed(&target_url, cancel).await {
            tracing::debug!("Redirect target disallowed by robots.txt: {}", target);
            return false;
        }

        tracing::debug!("{} redirects to {}, refetching", task.fetch_url, target);
        self.frontier.requeue(CrawlTask {
            url: task.url.clone(),
            fetch_url: target.to_string(),
            depth: task.depth,
            redirects: task.redirects + 1,
        })
    }

    /// Queues a same-host link unless robots.txt forbids it
    async fn enqueue_link(&self, link: &str, depth: u32, cancel: &CancellationToken) {
        let Ok(link_url) = Url::parse(link) else {
            return;
        };

        if !self.is_allowed(&link_url, cancel).await {
            tracing::debug!("Disallowed by robots.txt: {}", link);
            return;
        }

        if self.frontier.enqueue(link, depth) {
            tracing::trace!("Queued {} at depth {}", link, depth);
        }
    }

    fn record(&self, result: Arc<CrawlResult>) {
        {
            let mut results = self.results.lock();
            if results.contains_key(&result.url) {
                tracing::warn!("Duplicate result for {} ignored", result.url);
                return;
            }
            results.insert(result.url.clone(), Arc::clone(&result));
        }

        if let Some(sink) = &self.page_sink {
            let sink = Arc::clone(sink);
            let result = Arc::clone(&result);
            self.sink_tasks.lock().spawn(async move {
                let url = result.url.clone();
                if let Err(e) = sink.on_page(result).await {
                    tracing::warn!("Page sink failed for {}: {:#}", url, e);
                }
            });
        }

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % self.progress_interval == 0 {
            self.report_progress();
        }
    }

    fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            pages_completed: self.completed.load(Ordering::SeqCst),
            pages_queued: self.frontier.len(),
            pages_in_flight: self.frontier.in_flight(),
        }
    }

    fn report_progress(&self) {
        self.progress_sink.on_progress(self.progress());
    }

    /// Waits for every outstanding page sink call
    async fn drain_page_sink(&self) {
        let mut tasks = std::mem::take(&mut *self.sink_tasks.lock());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Page sink task failed: {}", e);
            }
        }
    }
}
