//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end. Browser strategies are never launched:
//! crawls either force the fast engine or run on injected strategies.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sumi_trawl::config::{BlockDetectorConfig, Config, EngineConfig};
use sumi_trawl::engine::{
    BlockDetector, FetchError, FetchRequest, FetchStrategy, FetchedPage, StrategyKind,
};
use sumi_trawl::{CrawlResult, Crawler, Engine, TrawlError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that only uses plain HTTP
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.depth = 2;
    config.crawler.concurrency = 4;
    config.crawler.rate_limit = 50;
    config.crawler.max_pages = 50;
    config.crawler.idle_timeout_ms = 3_000;
    config.crawler.min_word_count = 5;
    config.crawler.force_engine = Some(StrategyKind::Fast);
    config.crawler.use_auth = false;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

/// An HTML page with enough text to pass the word count gate
fn page(title: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a> "#, l))
        .collect();
    format!(
        r#"<html><head><title>{}</title></head><body><main>
        <p>This page talks at some length about {} so that it is worth keeping around.</p>
        {}
        </main></body></html>"#,
        title, title, anchors
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_never(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("never", &[])))
        .expect(0)
        .mount(server)
        .await;
}

fn paths(results: &[CrawlResult]) -> HashSet<String> {
    results
        .iter()
        .map(|r| url::Url::parse(&r.url).unwrap().path().to_string())
        .collect()
}

async fn run(crawler: &Crawler, seed: &str) -> Vec<CrawlResult> {
    let stream = crawler.crawl(&[seed]).await.expect("crawl should start");
    stream.collect().await
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        page(
            "Home",
            &[
                format!("{}/page1", base),
                "/page2".to_string(),
                "https://other.org/elsewhere".to_string(),
                "/logo.png".to_string(),
            ],
        ),
    )
    .await;
    mount_page(&server, "/page1", page("Page One", &["/".to_string()])).await;
    mount_page(&server, "/page2", page("Page Two", &[])).await;
    mount_never(&server, "/logo.png").await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let results = run(&crawler, &base).await;

    assert_eq!(
        paths(&results),
        ["/", "/page1", "/page2"].iter().map(|s| s.to_string()).collect()
    );
    assert!(results.iter().all(|r| r.strategy == StrategyKind::Fast));

    let home = results.iter().find(|r| r.content.title == "Home").unwrap();
    assert_eq!(home.depth, 0);
    let one = results.iter().find(|r| r.content.title == "Page One").unwrap();
    assert_eq!(one.depth, 1);
    assert!(one.content.word_count >= 5);

    crawler.close().await;
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        page("Home", &["/private/secret".to_string(), "/public".to_string()]),
    )
    .await;
    mount_page(&server, "/public", page("Public", &[])).await;
    mount_never(&server, "/private/secret").await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let stream = crawler.crawl(&[server.uri()]).await.unwrap();
    let results: Vec<_> = stream.collect().await;

    assert_eq!(
        paths(&results),
        ["/", "/public"].iter().map(|s| s.to_string()).collect()
    );
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;
    mount_page(&server, "/", page("Home", &[])).await;

    let mut config = create_test_config();
    config.crawler.respect_robots = false;
    config.crawler.use_sitemap = false;

    let results = run(&Crawler::new(&config).unwrap(), &server.uri()).await;
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_disallowed_seed_is_not_fetched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;
    mount_never(&server, "/").await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let mut stream = crawler.crawl(&[server.uri()]).await.unwrap();
    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result);
    }

    assert!(results.is_empty());
    assert_eq!(stream.counters().robots_denied, 1);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page("Root", &["/d1".to_string()])).await;
    mount_page(&server, "/d1", page("Depth one", &["/d2".to_string()])).await;
    mount_never(&server, "/d2").await;

    let mut config = create_test_config();
    config.crawler.depth = 1;

    let results = run(&Crawler::new(&config).unwrap(), &server.uri()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.depth <= 1));
}

#[tokio::test]
async fn test_page_budget() {
    let server = MockServer::start().await;

    let links: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    mount_page(&server, "/", page("Hub", &links)).await;
    for link in &links {
        mount_page(&server, link, page(link, &[])).await;
    }

    let mut config = create_test_config();
    config.crawler.max_pages = 3;

    let crawler = Crawler::new(&config).unwrap();
    let stream = crawler.crawl(&[server.uri()]).await.unwrap();
    let results: Vec<_> = stream.collect().await;

    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_sitemap_seeding() {
    let server = MockServer::start().await;
    let base = server.uri();

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{0}/from-sitemap-1</loc></url>
  <url><loc>{0}/from-sitemap-2</loc></url>
  <url><loc>https://other.org/not-ours</loc></url>
</urlset>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(&server)
        .await;

    mount_page(&server, "/", page("Home", &[])).await;
    mount_page(&server, "/from-sitemap-1", page("First", &[])).await;
    mount_page(&server, "/from-sitemap-2", page("Second", &[])).await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let stream = crawler.crawl(&[base.clone()]).await.unwrap();
    let results: Vec<_> = stream.collect().await;

    assert_eq!(
        paths(&results),
        ["/", "/from-sitemap-1", "/from-sitemap-2"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    );
    assert!(results
        .iter()
        .filter(|r| r.url.contains("from-sitemap"))
        .all(|r| r.depth == 1));
}

#[tokio::test]
async fn test_locale_variants_are_suppressed() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        page(
            "Home",
            &[
                "/en/docs/guide".to_string(),
                "/de/docs/guide".to_string(),
                "/fr/docs/guide".to_string(),
            ],
        ),
    )
    .await;
    mount_page(&server, "/en/docs/guide", page("Guide", &[])).await;
    mount_never(&server, "/de/docs/guide").await;
    mount_never(&server, "/fr/docs/guide").await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let mut stream = crawler.crawl(&[server.uri()]).await.unwrap();

    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result);
    }

    assert_eq!(
        paths(&results),
        ["/", "/en/docs/guide"].iter().map(|s| s.to_string()).collect()
    );
    assert_eq!(stream.counters().rejections.get("locale"), Some(&2));
}

#[tokio::test]
async fn test_blocked_and_error_pages_are_skipped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        page("Home", &["/forbidden".to_string(), "/missing".to_string()]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string(page("Not found", &[])))
        .mount(&server)
        .await;

    let crawler = Crawler::new(&create_test_config()).unwrap();
    let mut stream = crawler.crawl(&[server.uri()]).await.unwrap();
    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result);
    }

    assert_eq!(results.len(), 1);
    let stats = stream.statistics();
    assert_eq!(stats.pages_blocked, 1);
    assert_eq!(stats.http_errors, 1);
    assert_eq!(stats.pages_yielded, 1);
}

#[tokio::test]
async fn test_empty_frontier_is_an_error() {
    let crawler = Crawler::new(&create_test_config()).unwrap();
    let result = crawler.crawl(&["not a url", "ftp://example.com/"]).await;
    assert!(matches!(result, Err(TrawlError::EmptyFrontier)));
}

#[tokio::test]
async fn test_stream_can_be_abandoned() {
    let server = MockServer::start().await;

    let links: Vec<String> = (0..20).map(|i| format!("/p{}", i)).collect();
    mount_page(&server, "/", page("Hub", &links)).await;
    for link in &links {
        mount_page(&server, link, page(link, &[])).await;
    }

    let mut config = create_test_config();
    config.crawler.concurrency = 1;
    config.crawler.rate_limit = 1;

    let crawler = Crawler::new(&config).unwrap();
    let mut stream = crawler.crawl(&[server.uri()]).await.unwrap();
    let first = stream.next().await.expect("seed page");
    assert_eq!(first.depth, 0);
    drop(stream);

    // Queued tasks exit instead of fetching
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    let requests = server.received_requests().await.unwrap_or_default();
    let fetched = requests
        .iter()
        .filter(|r| r.url.path().starts_with("/p"))
        .count();
    assert!(fetched <= 2, "fetched {} pages after abandoning", fetched);

    crawler.close().await;
}

/// Strategy that serves canned pages without touching the network
struct ScriptedStrategy {
    kind: StrategyKind,
    status: u16,
    child_status: Option<u16>,
    base: String,
    calls: AtomicUsize,
}

#[async_trait]
impl FetchStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let html = if self.status == 429 {
            "Too many requests".to_string()
        } else if request.url.ends_with("/child") {
            page("Child", &[])
        } else {
            page("Root", &[format!("{}/child", self.base)])
        };
        let status_code = match self.child_status {
            Some(status) if request.url.ends_with("/child") => status,
            _ => self.status,
        };
        Ok(FetchedPage {
            html,
            status_code,
            final_url: request.url.clone(),
        })
    }

    async fn close(&self) {}
}

#[tokio::test]
async fn test_waterfall_escalates_past_blocked_fast_strategy() {
    // Only used for robots.txt and sitemap lookups, which 404
    let server = MockServer::start().await;
    let base = server.uri();

    let fast = Arc::new(ScriptedStrategy {
        kind: StrategyKind::Fast,
        status: 429,
        child_status: None,
        base: base.clone(),
        calls: AtomicUsize::new(0),
    });
    let browser = Arc::new(ScriptedStrategy {
        kind: StrategyKind::Browser,
        status: 200,
        child_status: None,
        base: base.clone(),
        calls: AtomicUsize::new(0),
    });

    let engine = Engine::with_strategies(
        vec![browser.clone(), fast.clone()],
        BlockDetector::new(BlockDetectorConfig::default(), Vec::new()),
        EngineConfig::default(),
    );

    let mut config = create_test_config();
    config.crawler.force_engine = None;

    let crawler = Crawler::new(&config).unwrap().with_engine(engine);
    let results = run(&crawler, &base).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.strategy == StrategyKind::Browser));
    assert_eq!(fast.calls.load(Ordering::SeqCst), 2);
    assert_eq!(browser.calls.load(Ordering::SeqCst), 2);

    let stats = crawler.engine_stats();
    assert_eq!(stats.blocks_for(StrategyKind::Fast), 2);
    assert_eq!(stats.successes_for(StrategyKind::Browser), 2);
}

#[tokio::test]
async fn test_browser_error_status_is_an_http_error() {
    let server = MockServer::start().await;
    let base = server.uri();

    let browser = Arc::new(ScriptedStrategy {
        kind: StrategyKind::Browser,
        status: 200,
        child_status: Some(404),
        base: base.clone(),
        calls: AtomicUsize::new(0),
    });
    let engine = Engine::with_strategies(
        vec![browser.clone()],
        BlockDetector::new(BlockDetectorConfig::default(), Vec::new()),
        EngineConfig::default(),
    );

    let mut config = create_test_config();
    config.crawler.force_engine = None;

    let crawler = Crawler::new(&config).unwrap().with_engine(engine);
    let mut stream = crawler.crawl(&[base.as_str()]).await.unwrap();
    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result);
    }

    assert_eq!(paths(&results), ["/".to_string()].into_iter().collect());
    assert_eq!(browser.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stream.statistics().http_errors, 1);
}

#[tokio::test]
async fn test_idle_timeout_ends_stalled_crawl() {
    let server = MockServer::start().await;

    mount_page(&server, "/", page("Home", &["/slow".to_string()])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page("Slow", &[]))
                .set_delay(std::time::Duration::from_secs(20)),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.use_sitemap = false;
    config.crawler.timeout_ms = 30_000;
    config.crawler.idle_timeout_ms = 1_000;
    config.engine.fast_timeout_ms = 30_000;

    let crawler = Crawler::new(&config).unwrap();
    let started = std::time::Instant::now();
    let results = tokio::time::timeout(std::time::Duration::from_secs(8), run(&crawler, &server.uri()))
        .await
        .expect("idle timeout should end the crawl");

    assert_eq!(paths(&results), ["/".to_string()].into_iter().collect());
    assert!(started.elapsed() < std::time::Duration::from_secs(8));

    crawler.close().await;
}

#[tokio::test]
async fn test_stored_session_cookies_are_sent() {
    let server = MockServer::start().await;
    let sessions = tempfile::TempDir::new().unwrap();
    std::fs::write(
        sessions.path().join("127.0.0.1.json"),
        r#"{"cookies":[{"name":"sid","value":"abc"}]}"#,
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("cookie", "sid=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(page("Members", &[]), "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.use_auth = true;
    config.auth.session_dir = sessions.path().to_path_buf();

    let crawler = Crawler::new(&config).unwrap();
    let results = run(&crawler, &server.uri()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content.title, "Members");
}
