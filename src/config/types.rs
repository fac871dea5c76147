use crate::engine::StrategyKind;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Trawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub engine: EngineConfig,
    #[serde(rename = "block-detector")]
    pub block_detector: BlockDetectorConfig,
    pub auth: AuthConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URLs
    pub depth: u32,

    /// Maximum number of concurrently running fetch tasks
    pub concurrency: u32,

    /// Maximum number of pages yielded by one crawl
    pub max_pages: u32,

    /// Maximum number of fetch tasks started per second
    pub rate_limit: u32,

    /// HTTP client ceiling for page, robots.txt and sitemap requests (milliseconds)
    pub timeout_ms: u64,

    /// Whether robots.txt rules are honoured
    pub respect_robots: bool,

    /// Whether sitemaps seed the frontier
    pub use_sitemap: bool,

    /// Regular expression a URL must match to be crawled
    pub include_pattern: Option<String>,

    /// Regular expression that excludes matching URLs
    pub exclude_pattern: Option<String>,

    /// Run only this fetch strategy instead of the waterfall
    pub force_engine: Option<StrategyKind>,

    /// Whether stored authentication sessions are used
    pub use_auth: bool,

    /// Silence window after which the crawl is considered exhausted (milliseconds)
    pub idle_timeout_ms: u64,

    /// Pages with fewer extracted words are dropped
    pub min_word_count: usize,

    /// Language whose locale variants win over other locales
    pub preferred_language: String,

    /// Upper bound on URLs admitted from robots/sitemap discovery
    pub discovery_limit: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth: 2,
            concurrency: 10,
            max_pages: 150,
            rate_limit: 10,
            timeout_ms: 10_000,
            respect_robots: true,
            use_sitemap: true,
            include_pattern: None,
            exclude_pattern: None,
            force_engine: None,
            use_auth: true,
            idle_timeout_ms: 15_000,
            min_word_count: 20,
            preferred_language: "en".to_string(),
            discovery_limit: 50,
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,

    /// User agent presented by the fetch strategies
    pub browser_agent: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiTrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            browser_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                            (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Identification string: CrawlerName/Version (+ContactURL)
    pub fn identity(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Fetch strategy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Per-attempt timeout of the plain HTTP strategy (milliseconds)
    pub fast_timeout_ms: u64,

    /// Per-attempt timeout of the scripted browser strategy (milliseconds)
    pub browser_timeout_ms: u64,

    /// Per-attempt timeout of the stealth browser strategy (milliseconds)
    pub stealth_timeout_ms: u64,

    /// Extra wait after navigation before the DOM is read (milliseconds)
    pub settle_ms: u64,

    /// Chrome/Chromium executable; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,

    /// Command run once to install a browser when none is found
    pub install_command: Option<Vec<String>>,

    /// Hosts known to require a scripted browser (wildcards allowed)
    pub protected_domains: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_timeout_ms: 5_000,
            browser_timeout_ms: 15_000,
            stealth_timeout_ms: 30_000,
            settle_ms: 500,
            chrome_executable: None,
            install_command: None,
            protected_domains: [
                "*.linkedin.com",
                "*.instagram.com",
                "*.facebook.com",
                "*.twitter.com",
                "*.x.com",
                "*.tiktok.com",
                "*.glassdoor.com",
                "*.indeed.com",
                "*.zillow.com",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

impl EngineConfig {
    pub fn timeout_for(&self, kind: StrategyKind) -> Duration {
        let ms = match kind {
            StrategyKind::Fast => self.fast_timeout_ms,
            StrategyKind::Browser => self.browser_timeout_ms,
            StrategyKind::Stealth => self.stealth_timeout_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Block detector thresholds and confidences
///
/// The defaults are calibration targets for the heuristic marker lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BlockDetectorConfig {
    /// Bodies shorter than this are not substantive
    pub min_substantive_length: usize,

    /// Provider markers are ignored on bodies at least this long
    pub provider_length_ceiling: usize,

    /// Captcha markers are ignored on bodies at least this long
    pub captcha_length_ceiling: usize,

    /// Generic access-denied phrasing only counts below this length
    pub short_body_length: usize,

    /// The javascript-required check only applies below this length
    pub js_required_length: usize,

    pub forbidden_confidence: f32,
    pub rate_limit_confidence: f32,
    pub challenge_confidence: f32,
    pub empty_body_confidence: f32,
    pub captcha_confidence: f32,
    pub access_denied_confidence: f32,
    pub javascript_confidence: f32,
}

impl Default for BlockDetectorConfig {
    fn default() -> Self {
        Self {
            min_substantive_length: 500,
            provider_length_ceiling: 50_000,
            captcha_length_ceiling: 20_000,
            short_body_length: 2_000,
            js_required_length: 5_000,
            forbidden_confidence: 0.9,
            rate_limit_confidence: 0.95,
            challenge_confidence: 0.95,
            empty_body_confidence: 0.7,
            captcha_confidence: 0.85,
            access_denied_confidence: 0.7,
            javascript_confidence: 0.6,
        }
    }
}

/// Stored session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AuthConfig {
    /// Directory holding one `<domain>.json` session file per domain
    pub session_dir: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            session_dir: base.join(".sumi-trawl").join("sessions"),
        }
    }
}
