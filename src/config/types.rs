use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Ripplemap
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawl request parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URL the crawl starts from
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Maximum number of pages fetched in one session
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum depth to crawl; the seed is depth 1
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Delay each worker waits before issuing a request (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Number of concurrent fetch workers
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,

    /// Timeout for a single HTTP request (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional wall-clock limit for the whole session (seconds)
    #[serde(rename = "session-timeout-secs", default)]
    pub session_timeout_secs: Option<u64>,

    /// Whether robots.txt disallow rules are honored
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// Retries for transient transport failures (timeouts, refused connections)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, doubled on each attempt (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Progress is reported every this many recorded pages
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl CrawlerConfig {
    /// Creates a configuration for `seed_url` with every other parameter at its default
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            request_delay_ms: default_request_delay_ms(),
            worker_count: default_worker_count(),
            request_timeout_ms: default_request_timeout_ms(),
            session_timeout_secs: None,
            respect_robots_txt: true,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            progress_interval: default_progress_interval(),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Where the CLI writes the sitemap
    #[serde(rename = "sitemap-path", default = "default_sitemap_path")]
    pub sitemap_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sitemap_path: default_sitemap_path(),
        }
    }
}

fn default_max_pages() -> usize {
    500
}

fn default_max_depth() -> u32 {
    3
}

fn default_request_delay_ms() -> u64 {
    200
}

fn default_worker_count() -> usize {
    8
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_progress_interval() -> usize {
    10
}

fn default_sitemap_path() -> String {
    "sitemap.xml".to_string()
}
