//! Crawl scheduling
//!
//! A crawl moves through four phases:
//! - Seed: every start URL is enqueued at depth 0 straight away
//! - Discover: robots.txt and sitemaps contribute depth-1 URLs in the background
//! - Drain: finished tasks are yielded in completion order
//! - Terminal: queue drained, page budget reached or idle timeout elapsed

use crate::auth::{AuthStore, FileSessionStore};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::{
    AdmissionRules, CrawlCounters, CrawlCountersSnapshot, Frontier, Rejection, TaskQueue,
};
use crate::dedup::DedupTracker;
use crate::engine::{build_http_client, Engine, EngineStatsSnapshot, FetchOptions, StrategyKind};
use crate::extract::{ContentExtractor, ExtractedContent, HtmlExtractor};
use crate::output::CrawlStatistics;
use crate::robots::RobotsPolicy;
use crate::sitemap::SitemapDiscoverer;
use crate::url::{extract_domain, normalize_url, UrlPatterns};
use crate::TrawlError;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// Robots.txt budget during discovery
const DISCOVERY_ROBOTS_TIMEOUT: Duration = Duration::from_secs(3);

/// Sitemap budget per seed during discovery
const DISCOVERY_SITEMAP_TIMEOUT: Duration = Duration::from_secs(5);

/// One accepted page
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub url: String,

    /// URL after redirects
    pub final_url: String,
    pub content: ExtractedContent,
    pub depth: u32,
    pub strategy: StrategyKind,
    pub fetched_at: DateTime<Utc>,
}

/// Crawls sites through the fetch engine
///
/// One `Crawler` may run several crawls; each call to [`Crawler::crawl`]
/// gets its own visited set, robots cache and dedup state. The engine (and
/// any browsers it launched) is shared until [`Crawler::close`].
pub struct Crawler {
    config: Config,
    engine: Arc<Engine>,
    extractor: Arc<dyn ContentExtractor>,
    auth: Option<Arc<dyn AuthStore>>,
    client: Client,
}

impl Crawler {
    pub fn new(config: &Config) -> crate::Result<Self> {
        let engine = Engine::new(config)?;
        let client = build_http_client(&config.user_agent, config.crawler.timeout())?;
        let auth: Option<Arc<dyn AuthStore>> = if config.crawler.use_auth {
            Some(Arc::new(FileSessionStore::new(config.auth.session_dir.clone())))
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            engine: Arc::new(engine),
            extractor: Arc::new(HtmlExtractor::new()),
            auth,
            client,
        })
    }

    /// Replaces the fetch engine, e.g. with custom strategies
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the session store; ignored when `use-auth` is off
    pub fn with_auth_store(mut self, store: Arc<dyn AuthStore>) -> Self {
        if self.config.crawler.use_auth {
            self.auth = Some(store);
        }
        self
    }

    pub fn engine_stats(&self) -> EngineStatsSnapshot {
        self.engine.stats()
    }

    /// Tears down every browser the engine launched
    pub async fn close(&self) {
        self.engine.close().await;
    }

    /// Starts a crawl from the given seed URLs
    ///
    /// Invalid seeds are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`TrawlError::EmptyFrontier`] if no seed is a valid http(s) URL,
    /// [`TrawlError::Pattern`] if an include/exclude pattern does not compile.
    pub async fn crawl<S: AsRef<str>>(&self, seeds: &[S]) -> crate::Result<CrawlStream> {
        let crawler = &self.config.crawler;
        let patterns = UrlPatterns::new(
            crawler.include_pattern.as_deref(),
            crawler.exclude_pattern.as_deref(),
        )?;

        let mut seed_urls: Vec<Url> = Vec::new();
        for seed in seeds {
            match normalize_url(seed.as_ref()) {
                Ok(url) if !seed_urls.contains(&url) => seed_urls.push(url),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping invalid seed {}: {}", seed.as_ref(), e),
            }
        }
        if seed_urls.is_empty() {
            return Err(TrawlError::EmptyFrontier);
        }

        let rules = AdmissionRules {
            max_depth: crawler.depth,
            max_pages: crawler.max_pages as usize,
            respect_robots: crawler.respect_robots,
            robots_agent: self.config.user_agent.crawler_name.clone(),
        };
        let frontier = Frontier::new(
            &seed_urls,
            patterns,
            DedupTracker::new(&crawler.preferred_language),
            rules,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(CrawlShared {
            config: crawler.clone(),
            robots_agent: self.config.user_agent.crawler_name.clone(),
            frontier,
            robots: RobotsPolicy::new(self.client.clone()),
            sitemaps: SitemapDiscoverer::new(self.client.clone()),
            engine: self.engine.clone(),
            extractor: self.extractor.clone(),
            auth: self.auth.clone(),
            queue: TaskQueue::new(crawler.concurrency as usize, crawler.rate_limit as usize),
            counters: CrawlCounters::default(),
            submitted: AtomicUsize::new(0),
            tx,
        });

        tracing::info!(
            "Starting crawl of {} seed(s): depth {}, max {} pages, concurrency {}",
            seed_urls.len(),
            crawler.depth,
            crawler.max_pages,
            crawler.concurrency
        );

        for seed in &seed_urls {
            if shared.frontier.mark_seed(seed) {
                shared.counters.record_seed();
                submit(&shared, seed.clone(), 0);
            }
        }

        if crawler.respect_robots || crawler.use_sitemap {
            // Counts as a task so the drain loop waits for discovered URLs
            shared.submitted.fetch_add(1, Ordering::SeqCst);
            let discovery = shared.clone();
            tokio::spawn(async move {
                discover(&discovery, seed_urls).await;
                let _ = discovery.tx.send(None);
            });
        }

        Ok(CrawlStream::new(shared, rx))
    }
}

/// Crawl-scoped state shared by every task
struct CrawlShared {
    config: CrawlerConfig,
    robots_agent: String,
    frontier: Frontier,
    robots: RobotsPolicy,
    sitemaps: SitemapDiscoverer,
    engine: Arc<Engine>,
    extractor: Arc<dyn ContentExtractor>,
    auth: Option<Arc<dyn AuthStore>>,
    queue: TaskQueue,
    counters: CrawlCounters,

    /// Tasks whose outcome the drain loop still expects
    submitted: AtomicUsize,
    tx: mpsc::UnboundedSender<Option<CrawlResult>>,
}

impl CrawlShared {
    fn admit(&self, candidate: &str, depth: u32) -> Option<Url> {
        match self.frontier.admit(
            candidate,
            depth,
            self.counters.yielded(),
            &self.robots,
        ) {
            Ok(url) => {
                self.counters.record_admitted();
                Some(url)
            }
            Err(rejection) => {
                if rejection != Rejection::Visited {
                    tracing::debug!("Rejected {}: {}", candidate, rejection);
                }
                self.counters.record_rejection(&rejection);
                None
            }
        }
    }

    fn statistics(&self) -> CrawlStatistics {
        CrawlStatistics::new(self.counters.snapshot(), self.engine.stats())
    }
}

/// Queues one URL; its task always reports exactly one outcome
///
/// The parent's outcome is sent only after all its children are submitted,
/// so the drain loop never sees `received == submitted` while work remains.
fn submit(shared: &Arc<CrawlShared>, url: Url, depth: u32) {
    shared.submitted.fetch_add(1, Ordering::SeqCst);
    let task = shared.clone();
    shared.queue.spawn(async move {
        let outcome = process_url(&task, url, depth).await;
        let _ = task.tx.send(outcome);
    });
}

/// Fetches robots.txt for every seed, then seeds from sitemaps
async fn discover(shared: &Arc<CrawlShared>, seeds: Vec<Url>) {
    let robots_fetches = seeds.iter().map(|seed| async move {
        if tokio::time::timeout(DISCOVERY_ROBOTS_TIMEOUT, shared.robots.parse(seed.as_str()))
            .await
            .is_err()
        {
            tracing::warn!("robots.txt discovery timed out for {}", seed);
        }
    });
    futures::future::join_all(robots_fetches).await;

    if !shared.config.use_sitemap {
        return;
    }

    let limit = shared
        .config
        .max_pages
        .min(shared.config.discovery_limit) as usize;
    let mut admitted = 0;

    for seed in &seeds {
        if admitted >= limit || shared.queue.is_closed() {
            break;
        }

        let declared = shared.robots.sitemaps(seed.as_str()).into_iter().next();
        let lookup = async {
            match &declared {
                Some(sitemap) => shared.sitemaps.discover_from(sitemap).await,
                None => shared.sitemaps.discover(seed.as_str()).await,
            }
        };

        let urls = match tokio::time::timeout(DISCOVERY_SITEMAP_TIMEOUT, lookup).await {
            Ok(urls) => urls,
            Err(_) => {
                tracing::warn!("Sitemap discovery timed out for {}", seed);
                continue;
            }
        };
        tracing::debug!("Sitemaps for {} listed {} URLs", seed, urls.len());

        for candidate in urls {
            if admitted >= limit {
                break;
            }
            shared.counters.record_discovered();
            if let Some(url) = shared.admit(&candidate, 1) {
                submit(shared, url, 1);
                admitted += 1;
            }
        }
    }

    if admitted > 0 {
        tracing::info!("Discovery added {} URLs from sitemaps", admitted);
    }
}

/// Fetches, screens and extracts one page, then admits its links
async fn process_url(shared: &Arc<CrawlShared>, url: Url, depth: u32) -> Option<CrawlResult> {
    let config = &shared.config;

    // Seeds skip admission, and links may reach hosts discovery never saw
    if config.respect_robots {
        if !shared.robots.is_cached(url.as_str()) {
            shared.robots.parse(url.as_str()).await;
        }
        if !shared.robots.is_allowed(url.as_str(), &shared.robots_agent) {
            tracing::debug!("{} disallowed by robots.txt", url);
            shared.counters.record_robots_denied();
            return None;
        }
    }

    let session_path = shared.auth.as_ref().and_then(|store| {
        let domain = extract_domain(&url)?;
        store.has_session(&domain).then(|| store.session_path(&domain))
    });
    if let Some(path) = &session_path {
        tracing::debug!("Using stored session {} for {}", path.display(), url);
    }

    let options = FetchOptions {
        force: config.force_engine,
        timeout: None,
        session_path,
    };

    let response = match shared.engine.fetch(url.as_str(), &options).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Giving up on {}: {}", url, e);
            shared.counters.record_failed();
            return None;
        }
    };

    if response.blocked {
        tracing::info!(
            "Skipping blocked page {} ({})",
            url,
            response.block_reason.map(|r| r.as_str()).unwrap_or("unknown")
        );
        shared.counters.record_blocked();
        return None;
    }

    if response.status_code >= 400 {
        tracing::info!("Skipping {}: HTTP {}", url, response.status_code);
        shared.counters.record_http_error();
        return None;
    }

    let final_url = Url::parse(&response.final_url).unwrap_or_else(|_| url.clone());
    let content = match shared.extractor.extract(&response.html, &final_url) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Extraction failed for {}: {}", url, e);
            shared.counters.record_failed();
            return None;
        }
    };

    if content.word_count < config.min_word_count {
        tracing::debug!(
            "Skipping low-value page {} ({} words)",
            url,
            content.word_count
        );
        shared.counters.record_low_value();
        return None;
    }

    if depth < config.depth && !shared.queue.is_closed() {
        for link in &content.links {
            if let Some(child) = shared.admit(link, depth + 1) {
                submit(shared, child, depth + 1);
            }
        }
    }

    tracing::debug!(
        "Fetched {} at depth {} via {} ({} words)",
        url,
        depth,
        response.strategy_used,
        content.word_count
    );

    Some(CrawlResult {
        url: url.to_string(),
        final_url: response.final_url,
        content,
        depth,
        strategy: response.strategy_used,
        fetched_at: Utc::now(),
    })
}

struct DrainState {
    shared: Arc<CrawlShared>,
    rx: mpsc::UnboundedReceiver<Option<CrawlResult>>,
    received: usize,
    idle_deadline: Instant,
}

impl DrainState {
    async fn next(&mut self) -> Option<CrawlResult> {
        let max_pages = self.shared.config.max_pages as usize;
        let idle = self.shared.config.idle_timeout();

        loop {
            if self.shared.counters.yielded() >= max_pages {
                tracing::info!("Page budget of {} reached", max_pages);
                return None;
            }

            if self.received >= self.shared.submitted.load(Ordering::SeqCst) {
                tracing::info!("Frontier drained");
                return None;
            }

            match tokio::time::timeout_at(self.idle_deadline, self.rx.recv()).await {
                Err(_) => {
                    tracing::warn!("No new pages for {:?}, ending crawl", idle);
                    return None;
                }
                Ok(None) => return None,
                Ok(Some(outcome)) => {
                    self.received += 1;
                    if let Some(result) = outcome {
                        self.shared.counters.record_yield();
                        self.idle_deadline = Instant::now() + idle;
                        return Some(result);
                    }
                }
            }
        }
    }
}

/// Lazily produced crawl results, in completion order
///
/// Dropping the stream early closes the task queue: queued tasks exit
/// without fetching and in-flight tasks run to their own timeout.
pub struct CrawlStream {
    shared: Arc<CrawlShared>,
    inner: BoxStream<'static, CrawlResult>,
}

impl CrawlStream {
    fn new(shared: Arc<CrawlShared>, rx: mpsc::UnboundedReceiver<Option<CrawlResult>>) -> Self {
        let state = DrainState {
            shared: shared.clone(),
            rx,
            received: 0,
            idle_deadline: Instant::now() + shared.config.idle_timeout(),
        };

        let inner = stream::unfold(state, |mut state| async move {
            match state.next().await {
                Some(result) => Some((result, state)),
                None => {
                    state.shared.queue.close();
                    None
                }
            }
        })
        .fuse()
        .boxed();

        Self { shared, inner }
    }

    /// Counters so far, combined with the engine's
    pub fn statistics(&self) -> CrawlStatistics {
        self.shared.statistics()
    }

    pub fn counters(&self) -> CrawlCountersSnapshot {
        self.shared.counters.snapshot()
    }
}

impl Stream for CrawlStream {
    type Item = CrawlResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for CrawlStream {
    fn drop(&mut self) {
        self.shared.queue.close();
    }
}
