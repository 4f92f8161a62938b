//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use parking_lot::Mutex;
use ripplemap::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use ripplemap::crawler::{crawl, CrawlProgress, CrawlResult, PageSink};
use ripplemap::{ConfigError, CrawlSession, RippleError, SessionState};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "TestBot/1.0 (+https://example.com/bot; bot@example.com)";

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/bot".to_string(),
        contact_email: "bot@example.com".to_string(),
    }
}

/// Fast test configuration seeded at the server root
fn test_config(server: &MockServer) -> CrawlerConfig {
    let mut config = CrawlerConfig::new(format!("{}/", server.uri()));
    config.request_delay_ms = 0;
    config.worker_count = 4;
    config.retry_backoff_ms = 10;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

/// Mounts a GET handler serving HTML at `route`
async fn page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts a GET handler that must never be called
async fn never_fetched(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html("<p>should not be fetched</p>"))
        .expect(0)
        .mount(server)
        .await;
}

async fn run(config: CrawlerConfig) -> ripplemap::CrawlOutput {
    let mut session = CrawlSession::new(config, &user_agent()).unwrap();
    let output = session.run(CancellationToken::new()).await.unwrap();
    assert_eq!(session.state(), SessionState::Completed);
    output
}

fn key(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}

#[tokio::test]
async fn test_single_page_site() {
    let server = MockServer::start().await;
    page(&server, "/", "<html><head><title>Home</title></head><body>No links</body></html>").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 1);
    let home = &output.results[&server.uri()];
    assert_eq!(home.status_code, 200);
    assert_eq!(home.depth, 1);
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert!(home.errors.is_empty());
    assert_eq!(output.sitemap.matches("<url>").count(), 1);
    assert!(!output.cancelled);
}

#[tokio::test]
async fn test_query_variants_collapse() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a><a href="/a?x=1">A again</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<p>a</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
    assert!(output.results.contains_key(&key(&server, "/a")));
}

#[tokio::test]
async fn test_page_cap_stops_fetching() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        r#"<a href="/p1">1</a><a href="/p2">2</a><a href="/p3">3</a><a href="/p4">4</a><a href="/p5">5</a>"#,
    )
    .await;
    for route in ["/p1", "/p2", "/p3", "/p4", "/p5"] {
        never_fetched(&server, route).await;
    }

    let mut config = test_config(&server);
    config.max_pages = 1;
    let output = run(config).await;

    assert_eq!(output.results.len(), 1);
    assert!(output.results.contains_key(&server.uri()));
}

#[tokio::test]
async fn test_page_cap_with_many_workers() {
    let server = MockServer::start().await;
    let links: String = (0..30)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    page(&server, "/", &links).await;
    Mock::given(method("GET"))
        .respond_with(html("<p>leaf</p>"))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.max_pages = 10;
    config.worker_count = 8;
    let output = run(config).await;

    assert_eq!(output.results.len(), 10);
    let page_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count();
    assert_eq!(page_requests, 10);
}

#[tokio::test]
async fn test_server_error_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(r#"<a href="/a">A</a>"#, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    never_fetched(&server, "/a").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 1);
    let result = &output.results[&server.uri()];
    assert_eq!(result.status_code, 500);
    assert!(result.body.is_none());
    assert!(result.discovered_links.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("HTTP 500"));
    assert!(!output.sitemap.contains("<url>"));
    assert_eq!(output.stats.pages_failed, 1);
}

#[tokio::test]
async fn test_each_page_fetched_once() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    page(&server, "/a", r#"<a href="/b">B</a><a href="/c">C</a><a href="/a/">self</a>"#).await;
    page(&server, "/b", r#"<a href="/a">A</a><a href="/c">C</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html(r#"<a href="/a">A</a><a href="/b#x">B</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(test_config(&server)).await;

    assert_eq!(
        output.results.keys().cloned().collect::<Vec<_>>(),
        vec![
            server.uri(),
            key(&server, "/a"),
            key(&server, "/b"),
            key(&server, "/c"),
        ]
    );

    let requests = server.received_requests().await.unwrap();
    for route in ["/", "/a", "/b", "/c"] {
        let count = requests.iter().filter(|r| r.url.path() == route).count();
        assert_eq!(count, 1, "{} fetched {} times", route, count);
    }
}

#[tokio::test]
async fn test_depth_bound() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a>"#).await;
    page(&server, "/a", r#"<a href="/b">B</a>"#).await;
    never_fetched(&server, "/b").await;

    let mut config = test_config(&server);
    config.max_depth = 2;
    let output = run(config).await;

    assert_eq!(output.results.len(), 2);
    let a = &output.results[&key(&server, "/a")];
    assert_eq!(a.depth, 2);
    assert!(a.discovered_links.is_empty());
    assert!(output.results.values().all(|r| r.depth <= 2));
    assert_eq!(output.stats.max_depth_reached, 2);
}

#[tokio::test]
async fn test_robots_disallow_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "User-agent: *\nDisallow: /private\n\nUser-agent: OtherBot\nDisallow: /\n",
            "text/plain",
        ))
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/", r#"<a href="/public">Public</a><a href="/private/x">Private</a>"#).await;
    page(&server, "/public", r#"<a href="/private">Private</a>"#).await;
    never_fetched(&server, "/private").await;
    never_fetched(&server, "/private/x").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
    assert!(output.results.contains_key(&key(&server, "/public")));
}

#[tokio::test]
async fn test_robots_agent_group() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("User-agent: testbot\nDisallow: /secret\n", "text/plain"),
        )
        .mount(&server)
        .await;
    page(&server, "/", r#"<a href="/secret">S</a><a href="/open">O</a>"#).await;
    page(&server, "/open", "<p>open</p>").await;
    never_fetched(&server, "/secret").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
}

#[tokio::test]
async fn test_robots_group_named_after_contact_domain_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "User-agent: *\nDisallow: /private\n\nUser-agent: Example\nDisallow: /only-for-example\n",
            "text/plain",
        ))
        .mount(&server)
        .await;
    page(&server, "/", r#"<a href="/private/secret">S</a><a href="/only-for-example">E</a>"#).await;
    page(&server, "/only-for-example", "<p>fine for us</p>").await;
    never_fetched(&server, "/private/secret").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
    assert!(output.results.contains_key(&key(&server, "/only-for-example")));
}

/// Mounts a GET handler answering with a redirect to `location`
async fn redirect(server: &MockServer, route: &str, status: u16, location: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).insert_header("Location", location))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /private\n", "text/plain"))
        .mount(&server)
        .await;
    page(&server, "/", r#"<a href="/go">Go</a>"#).await;
    redirect(&server, "/go", 301, "/private/x/").await;
    never_fetched(&server, "/private/x/").await;
    never_fetched(&server, "/child").await;

    let output = run(test_config(&server)).await;

    let go = &output.results[&key(&server, "/go")];
    assert_eq!(go.status_code, 301);
    assert!(!go.is_success());
    assert_eq!(go.redirect_to.as_deref(), Some(key(&server, "/private/x/").as_str()));
    assert_eq!(output.results.len(), 2);
    assert!(!output.sitemap.contains("/go<"));
}

#[tokio::test]
async fn test_redirect_to_other_host_not_followed() {
    let server = MockServer::start().await;
    let port = url::Url::parse(&server.uri()).unwrap().port().unwrap();
    page(&server, "/", r#"<a href="/away">Away</a>"#).await;
    redirect(&server, "/away", 302, &format!("http://localhost:{}/elsewhere", port)).await;
    never_fetched(&server, "/elsewhere").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
    let away = &output.results[&key(&server, "/away")];
    assert_eq!(away.status_code, 302);
    assert!(away.body.is_none());
}

#[tokio::test]
async fn test_redirect_target_crawled_with_its_own_links() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/old">Old</a>"#).await;
    redirect(&server, "/old", 301, "/new/").await;
    page(&server, "/new/", r#"<a href="child">Child</a>"#).await;
    page(&server, "/new/child", "<p>child</p>").await;
    never_fetched(&server, "/child").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results[&key(&server, "/old")].status_code, 301);
    let new = &output.results[&key(&server, "/new")];
    assert!(new.is_success());
    assert_eq!(new.depth, 2);
    assert!(output.results[&key(&server, "/new/child")].is_success());
}

#[tokio::test]
async fn test_trailing_slash_redirect_refetched() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/docs">Docs</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs/"))
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/docs/", r#"<title>Docs</title><a href="intro">Intro</a>"#).await;
    page(&server, "/docs/intro", "<p>intro</p>").await;

    let output = run(test_config(&server)).await;

    let docs = &output.results[&key(&server, "/docs")];
    assert_eq!(docs.status_code, 200);
    assert_eq!(docs.title.as_deref(), Some("Docs"));
    assert!(output.results.contains_key(&key(&server, "/docs/intro")));
    assert!(output.sitemap.contains(&format!("<loc>{}</loc>", key(&server, "/docs"))));
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /\n", "text/plain"))
        .expect(0)
        .mount(&server)
        .await;
    page(&server, "/", r#"<a href="/a">A</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;

    let mut config = test_config(&server);
    config.respect_robots_txt = false;
    let output = run(config).await;

    assert_eq!(output.results.len(), 2);
}

#[tokio::test]
async fn test_disallowed_seed_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /\n", "text/plain"))
        .mount(&server)
        .await;
    never_fetched(&server, "/").await;

    let output = run(test_config(&server)).await;

    assert!(output.results.is_empty());
    assert!(!output.cancelled);
}

#[tokio::test]
async fn test_stays_on_seed_host() {
    let server = MockServer::start().await;
    let port = url::Url::parse(&server.uri()).unwrap().port().unwrap();
    page(
        &server,
        "/",
        &format!(
            r#"<a href="http://localhost:{}/other">Other host</a>
               <a href="https://example.org/page">External</a>
               <a href="/local">Local</a>"#,
            port
        ),
    )
    .await;
    page(&server, "/local", "<p>local</p>").await;
    never_fetched(&server, "/other").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 2);
    let seed_host = url::Url::parse(&server.uri()).unwrap();
    for url in output.results.keys() {
        let url = url::Url::parse(url).unwrap();
        assert_eq!(url.host_str(), seed_host.host_str());
    }
}

#[tokio::test]
async fn test_non_html_pages_not_parsed() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/data">Data</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"href": "/hidden"}"#, "application/json"))
        .mount(&server)
        .await;
    never_fetched(&server, "/hidden").await;

    let output = run(test_config(&server)).await;

    let data = &output.results[&key(&server, "/data")];
    assert_eq!(data.status_code, 200);
    assert!(data.discovered_links.is_empty());
    assert_eq!(data.title, None);
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(html("<p>hello</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let output = run(test_config(&server)).await;
    assert_eq!(output.results[&server.uri()].status_code, 200);
}

#[tokio::test]
async fn test_unreachable_host_retried() {
    // Reserve a port, then free it so connections are refused
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = CrawlerConfig::new(format!("http://127.0.0.1:{}/", port));
    config.request_delay_ms = 0;
    config.respect_robots_txt = false;
    config.max_retries = 2;
    config.retry_backoff_ms = 10;
    let output = run(config).await;

    assert_eq!(output.results.len(), 1);
    let result = output.results.values().next().unwrap();
    assert_eq!(result.status_code, 503);
    assert!(result.body.is_none());
    assert_eq!(result.errors.len(), 3);
}

#[tokio::test]
async fn test_request_timeout_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.request_timeout_ms = 200;
    config.max_retries = 0;
    let output = run(config).await;

    let result = &output.results[&server.uri()];
    assert_eq!(result.status_code, 408);
    assert!(result.body.is_none());
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let mut session = CrawlSession::new(test_config(&server), &user_agent()).unwrap();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let output = session.run(cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(output.cancelled);
    assert!(output.results.is_empty());
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn test_session_timeout() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/slow">Slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.session_timeout_secs = Some(1);
    let started = Instant::now();
    let output = run(config).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(output.cancelled);
    assert_eq!(output.results.len(), 1);
    assert!(output.results.contains_key(&server.uri()));
}

#[tokio::test]
async fn test_politeness_delay() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;

    let mut config = test_config(&server);
    config.request_delay_ms = 150;
    config.worker_count = 1;
    let started = Instant::now();
    let output = run(config).await;

    assert_eq!(output.results.len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

/// Collects every page handed to it
#[derive(Default)]
struct CollectingSink {
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl PageSink for CollectingSink {
    async fn on_page(&self, result: Arc<CrawlResult>) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.urls.lock().push(result.url.clone());
        Ok(())
    }
}

/// Fails on every page
struct FailingSink;

#[async_trait]
impl PageSink for FailingSink {
    async fn on_page(&self, result: Arc<CrawlResult>) -> anyhow::Result<()> {
        anyhow::bail!("cannot store {}", result.url)
    }
}

#[tokio::test]
async fn test_page_sink_receives_every_page() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;
    page(&server, "/b", "<p>b</p>").await;

    let sink = Arc::new(CollectingSink::default());
    let mut session = CrawlSession::new(test_config(&server), &user_agent())
        .unwrap()
        .with_page_sink(sink.clone());
    let output = session.run(CancellationToken::new()).await.unwrap();

    let mut received = sink.urls.lock().clone();
    received.sort();
    assert_eq!(received, output.results.keys().cloned().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_failing_page_sink_does_not_affect_crawl() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;

    let mut session = CrawlSession::new(test_config(&server), &user_agent())
        .unwrap()
        .with_page_sink(Arc::new(FailingSink));
    let output = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(output.results.len(), 2);
}

#[tokio::test]
async fn test_progress_reported() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;
    page(&server, "/b", "<p>b</p>").await;

    let reports = Arc::new(Mutex::new(Vec::<CrawlProgress>::new()));
    let sink = {
        let reports = Arc::clone(&reports);
        move |progress: CrawlProgress| reports.lock().push(progress)
    };

    let mut config = test_config(&server);
    config.progress_interval = 1;
    let mut session = CrawlSession::new(config, &user_agent())
        .unwrap()
        .with_progress_sink(Arc::new(sink));
    session.run(CancellationToken::new()).await.unwrap();

    let reports = reports.lock();
    // One per page plus the final report
    assert_eq!(reports.len(), 4);
    assert_eq!(
        reports.last().copied(),
        Some(CrawlProgress {
            pages_completed: 3,
            pages_queued: 0,
            pages_in_flight: 0,
        })
    );
}

#[tokio::test]
async fn test_sitemap_lists_successful_pages() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">A</a><a href="/missing">M</a>"#).await;
    page(&server, "/a", "<p>a</p>").await;

    let output = run(test_config(&server)).await;

    assert_eq!(output.results.len(), 3);
    assert_eq!(output.results[&key(&server, "/missing")].status_code, 404);

    let sitemap = &output.sitemap;
    assert!(sitemap.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(sitemap.contains("xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\""));
    assert_eq!(sitemap.matches("<url>").count(), 2);
    assert!(sitemap.contains(&format!("<loc>{}</loc>", server.uri())));
    assert!(sitemap.contains(&format!("<loc>{}</loc>", key(&server, "/a"))));
    assert!(!sitemap.contains("/missing"));

    let lastmod = format!("<lastmod>{}</lastmod>", output.started_at.format("%Y-%m-%d"));
    assert_eq!(sitemap.matches(&lastmod).count(), 2);
}

#[tokio::test]
async fn test_crawl_entry_point() {
    let server = MockServer::start().await;
    page(&server, "/", "<p>home</p>").await;

    let config = Config {
        crawler: test_config(&server),
        user_agent: user_agent(),
        output: OutputConfig::default(),
    };
    let output = crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(output.results.len(), 1);
    assert_eq!(output.stats.pages_succeeded, 1);
}

#[test]
fn test_invalid_seed_rejected() {
    for seed in ["not a url", "ftp://example.com/", "mailto:someone@example.com"] {
        let result = CrawlSession::new(CrawlerConfig::new(seed), &user_agent());
        assert!(
            matches!(result, Err(RippleError::Config(ConfigError::InvalidUrl(_)))),
            "seed {:?} accepted",
            seed
        );
    }
}

#[tokio::test]
async fn test_session_runs_once() {
    let server = MockServer::start().await;
    page(&server, "/", "<p>home</p>").await;

    let mut session = CrawlSession::new(test_config(&server), &user_agent()).unwrap();
    session.run(CancellationToken::new()).await.unwrap();

    let second = session.run(CancellationToken::new()).await;
    assert!(matches!(second, Err(RippleError::InvalidTransition { .. })));
}
