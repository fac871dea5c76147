//! Scripted headless browser strategies
//!
//! Both the plain and the stealth strategy drive a Chromium instance over
//! the DevTools protocol. Each strategy owns one lazily launched browser;
//! pages are opened per fetch and always closed afterwards.

use crate::config::{EngineConfig, UserAgentConfig};
use crate::engine::session::Session;
use crate::engine::{FetchError, FetchRequest, FetchStrategy, FetchedPage, StrategyKind};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, BrowserConfigBuilder};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tempfile::TempDir;

const NAVIGATION_WAIT: Duration = Duration::from_secs(10);

/// Process-wide check that a Chromium binary is available
///
/// The check (and the install command, if one is configured) runs at most
/// once; later callers share the memoized outcome.
#[derive(Debug)]
pub struct BrowserRuntime {
    chrome_executable: Option<PathBuf>,
    install_command: Option<Vec<String>>,
    ready: OnceCell<Result<(), String>>,
}

impl BrowserRuntime {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            chrome_executable: config.chrome_executable.clone(),
            install_command: config.install_command.clone(),
            ready: OnceCell::new(),
        }
    }

    pub async fn ensure_available(&self) -> Result<(), FetchError> {
        self.ready
            .get_or_init(|| self.detect_or_install())
            .await
            .clone()
            .map_err(FetchError::BrowserUnavailable)
    }

    async fn detect_or_install(&self) -> Result<(), String> {
        if self.detect().is_ok() {
            return Ok(());
        }

        let Some(command) = &self.install_command else {
            return self.detect();
        };
        let Some((program, args)) = command.split_first() else {
            return self.detect();
        };

        tracing::info!("No browser found, running install command: {}", command.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| format!("failed to run '{}': {}", program, e))?;

        if !status.success() {
            return Err(format!("install command exited with {}", status));
        }

        self.detect()
    }

    /// Resolving a launch config fails when no executable can be found
    fn detect(&self) -> Result<(), String> {
        match &self.chrome_executable {
            Some(path) if path.exists() => Ok(()),
            Some(path) => Err(format!("{} does not exist", path.display())),
            None => BrowserConfig::builder().build().map(|_| ()),
        }
    }
}

struct RunningBrowser {
    browser: Browser,
    handler: JoinHandle<()>,

    /// Removed when the browser is torn down
    _profile: TempDir,
}

/// Something holding a remote resource that must be released asynchronously
#[async_trait]
trait AsyncClose: Clone + Send + Sync + 'static {
    async fn close_now(self);
}

#[async_trait]
impl AsyncClose for Page {
    async fn close_now(self) {
        if let Err(e) = self.close().await {
            tracing::debug!("Page close error: {}", e);
        }
    }
}

/// Closes the wrapped page on every exit path
///
/// When the fetch future is dropped mid-render (the waterfall timed it
/// out), `Drop` hands the close to the runtime so the tab never outlives
/// the fetch.
struct PageGuard<P: AsyncClose> {
    page: P,
    closed: bool,
}

impl<P: AsyncClose> PageGuard<P> {
    fn new(page: P) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    async fn close(mut self) {
        self.closed = true;
        self.page.clone().close_now().await;
    }
}

impl<P: AsyncClose> std::ops::Deref for PageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.page
    }
}

impl<P: AsyncClose> Drop for PageGuard<P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(page.close_now());
        }
    }
}

/// Document status of a navigation, 200 when the browser recorded none
fn document_status(status: Option<i64>) -> u16 {
    status
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| (100..600).contains(s))
        .unwrap_or(200)
}

/// Fetches pages through a headless browser, optionally hardened against
/// automation fingerprinting
pub struct BrowserStrategy {
    stealth: bool,
    runtime: Arc<BrowserRuntime>,
    chrome_executable: Option<PathBuf>,
    user_agent: String,
    settle: Duration,
    running: RwLock<Option<RunningBrowser>>,
}

impl BrowserStrategy {
    pub fn new(
        stealth: bool,
        runtime: Arc<BrowserRuntime>,
        engine: &EngineConfig,
        user_agent: &UserAgentConfig,
    ) -> Self {
        Self {
            stealth,
            runtime,
            chrome_executable: engine.chrome_executable.clone(),
            user_agent: user_agent.browser_agent.clone(),
            settle: Duration::from_millis(engine.settle_ms),
            running: RwLock::new(None),
        }
    }

    /// A fresh profile directory, so browsers of separate engines never
    /// share Chromium's singleton lock
    fn profile_dir(&self) -> Result<TempDir, FetchError> {
        tempfile::Builder::new()
            .prefix(&format!("sumi-trawl-{}-", self.kind()))
            .tempdir()
            .map_err(|e| FetchError::Browser(format!("failed to create profile dir: {}", e)))
    }

    fn launch_config(&self, profile: &Path) -> Result<BrowserConfig, FetchError> {
        let mut builder: BrowserConfigBuilder = BrowserConfig::builder()
            .user_data_dir(profile)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent));

        if self.stealth {
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--lang=en-US")
                .window_size(1366, 768);
        }

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(FetchError::BrowserUnavailable)
    }

    async fn ensure_launched(&self) -> Result<(), FetchError> {
        if self.running.read().await.is_some() {
            return Ok(());
        }

        self.runtime.ensure_available().await?;

        let mut guard = self.running.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let profile = self.profile_dir()?;
        let (browser, mut handler) = Browser::launch(self.launch_config(profile.path())?)
            .await
            .map_err(|e| FetchError::Browser(format!("launch failed: {}", e)))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!("Launched {} browser", self.kind());
        *guard = Some(RunningBrowser {
            browser,
            handler,
            _profile: profile,
        });
        Ok(())
    }

    /// Opens the tab for one fetch
    ///
    /// The plain strategy navigates straight away unless cookies must be
    /// installed first; otherwise the page starts blank and [`Self::render`]
    /// navigates.
    async fn open_page(
        &self,
        browser: &Browser,
        request: &FetchRequest,
    ) -> Result<PageGuard<Page>, FetchError> {
        let start = if self.navigates_on_open(request) {
            request.url.as_str()
        } else {
            "about:blank"
        };

        let page = browser
            .new_page(start)
            .await
            .map(PageGuard::new)
            .map_err(|e| FetchError::Browser(format!("failed to open page: {}", e)))?;

        if self.stealth {
            page.enable_stealth_mode_with_agent(&self.user_agent)
                .await
                .map_err(|e| FetchError::Browser(format!("stealth setup failed: {}", e)))?;
        }

        Ok(page)
    }

    fn navigates_on_open(&self, request: &FetchRequest) -> bool {
        !self.stealth && request.session_path.is_none()
    }

    async fn render(&self, page: &Page, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        if let Some(path) = &request.session_path {
            let session = Session::load(path).await?;
            let cookies = cookie_params(&session, &request.url);
            if !cookies.is_empty() {
                page.set_cookies(cookies)
                    .await
                    .map_err(|e| FetchError::Browser(format!("failed to set cookies: {}", e)))?;
            }
        }

        if !self.navigates_on_open(request) {
            page.goto(request.url.as_str())
                .await
                .map_err(|e| FetchError::Browser(format!("navigation failed: {}", e)))?;
        }

        let navigation = tokio::time::timeout(NAVIGATION_WAIT, page.wait_for_navigation_response());
        let status = match navigation.await {
            Ok(Ok(Some(navigation))) => navigation.response.as_ref().map(|r| r.status),
            _ => None,
        };

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(format!("failed to read content: {}", e)))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());

        Ok(FetchedPage {
            html,
            status_code: document_status(status),
            final_url,
        })
    }
}

#[async_trait]
impl FetchStrategy for BrowserStrategy {
    fn kind(&self) -> StrategyKind {
        if self.stealth {
            StrategyKind::Stealth
        } else {
            StrategyKind::Browser
        }
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        self.ensure_launched().await?;

        let guard = self.running.read().await;
        let running = guard
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser was closed".to_string()))?;

        let page = self.open_page(&running.browser, request).await?;
        let result = self.render(&page, request).await;
        page.close().await;

        result
    }

    async fn close(&self) {
        let Some(mut running) = self.running.write().await.take() else {
            return;
        };

        if let Err(e) = running.browser.close().await {
            tracing::warn!("Error closing {} browser: {}", self.kind(), e);
        }
        let _ = running.browser.wait().await;
        running.handler.abort();
    }
}

/// Session cookies scoped to the page being fetched
fn cookie_params(session: &Session, url: &str) -> Vec<CookieParam> {
    let Ok(parsed) = url::Url::parse(url) else {
        return Vec::new();
    };
    let Some(host) = parsed.host_str() else {
        return Vec::new();
    };

    session
        .cookies_for(host, parsed.path())
        .filter_map(|cookie| {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .path(cookie.path.clone().unwrap_or_else(|| "/".to_string()));

            builder = match &cookie.domain {
                Some(domain) => builder.domain(domain.clone()),
                None => builder.url(url.to_string()),
            };

            builder.build().ok()
        })
        .collect()
}
