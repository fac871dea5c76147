use crate::config::{Config, EngineConfig};
use crate::engine::{
    BlockDetector, BlockReason, BrowserRuntime, BrowserStrategy, EngineStats, EngineStatsSnapshot,
    FetchError, FetchRequest, FetchStrategy, HttpStrategy, StrategyKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Per-call options for [`Engine::fetch`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Run only this strategy, returning its result even when blocked
    pub force: Option<StrategyKind>,

    /// Overrides every strategy's own timeout
    pub timeout: Option<Duration>,

    /// Stored session to load before fetching
    pub session_path: Option<PathBuf>,
}

/// A page returned by the waterfall
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub html: String,
    pub status_code: u16,
    pub strategy_used: StrategyKind,
    pub blocked: bool,
    pub block_reason: Option<BlockReason>,
    pub final_url: String,
}

/// Escalating fetch chain
///
/// Strategies are tried cheapest first. A strategy that errors, times out
/// or returns a page the [`BlockDetector`] classifies as blocked hands the
/// URL to the next one. The first clean page wins.
pub struct Engine {
    strategies: Vec<Arc<dyn FetchStrategy>>,
    detector: BlockDetector,
    config: EngineConfig,
    stats: EngineStats,
}

impl Engine {
    /// Builds the standard fast, browser and stealth chain
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let runtime = Arc::new(BrowserRuntime::new(&config.engine));

        let strategies: Vec<Arc<dyn FetchStrategy>> = vec![
            Arc::new(HttpStrategy::new(&config.crawler, &config.user_agent)?),
            Arc::new(BrowserStrategy::new(
                false,
                runtime.clone(),
                &config.engine,
                &config.user_agent,
            )),
            Arc::new(BrowserStrategy::new(
                true,
                runtime,
                &config.engine,
                &config.user_agent,
            )),
        ];

        let detector = BlockDetector::new(
            config.block_detector.clone(),
            config.engine.protected_domains.clone(),
        );

        Ok(Self::with_strategies(strategies, detector, config.engine.clone()))
    }

    /// Builds an engine over an arbitrary strategy set
    ///
    /// Strategies are sorted into escalation order.
    pub fn with_strategies(
        mut strategies: Vec<Arc<dyn FetchStrategy>>,
        detector: BlockDetector,
        config: EngineConfig,
    ) -> Self {
        strategies.sort_by_key(|s| s.kind());
        Self {
            strategies,
            detector,
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn detector(&self) -> &BlockDetector {
        &self.detector
    }

    /// Fetches a URL through the waterfall
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to fetch
    /// * `options` - Forced strategy, timeout override and stored session
    ///
    /// # Returns
    ///
    /// The first unblocked response. With a forced strategy its response is
    /// returned even when blocked, flagged through `blocked`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] once every strategy in the chain
    /// has failed or been blocked.
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<EngineResponse, FetchError> {
        let request = FetchRequest {
            url: url.to_string(),
            session_path: options.session_path.clone(),
        };

        let chain = self.chain_for(url, options.force);
        let mut attempts = Vec::new();

        for strategy in chain {
            let kind = strategy.kind();
            let timeout = options
                .timeout
                .unwrap_or_else(|| self.config.timeout_for(kind));

            let page = match tokio::time::timeout(timeout, strategy.fetch(&request)).await {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    tracing::warn!("{} strategy failed for {}: {}", kind, url, e);
                    self.stats.record_failure(kind);
                    attempts.push(format!("{}: {}", kind, e));
                    continue;
                }
                Err(_) => {
                    tracing::warn!("{} strategy timed out after {:?} for {}", kind, timeout, url);
                    self.stats.record_failure(kind);
                    attempts.push(format!("{}: timed out", kind));
                    continue;
                }
            };

            let verdict = self.detector.classify(&page.html, page.status_code, url);

            if verdict.blocked && options.force.is_none() {
                let reason = verdict.reason.map(|r| r.as_str()).unwrap_or("unknown");
                tracing::warn!(
                    "{} strategy blocked on {} ({}, confidence {:.2}), escalating",
                    kind,
                    url,
                    reason,
                    verdict.confidence
                );
                self.stats.record_block(kind);
                attempts.push(format!("{}: blocked ({})", kind, reason));
                continue;
            }

            if verdict.blocked {
                self.stats.record_block(kind);
            } else {
                self.stats.record_success(kind);
            }

            return Ok(EngineResponse {
                html: page.html,
                status_code: page.status_code,
                strategy_used: kind,
                blocked: verdict.blocked,
                block_reason: verdict.reason,
                final_url: page.final_url,
            });
        }

        self.stats.record_exhausted();
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
        })
    }

    /// The strategies to try, in order, for one URL
    fn chain_for(&self, url: &str, force: Option<StrategyKind>) -> Vec<Arc<dyn FetchStrategy>> {
        if let Some(kind) = force {
            return self
                .strategies
                .iter()
                .filter(|s| s.kind() == kind)
                .cloned()
                .collect();
        }

        let protected = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.detector.requires_browser(h)))
            .unwrap_or(false);

        if protected {
            tracing::debug!("{} is a protected host, skipping fast strategy", url);
        }

        self.strategies
            .iter()
            .filter(|s| !(protected && s.kind() == StrategyKind::Fast))
            .cloned()
            .collect()
    }

    /// Releases every strategy's resources
    pub async fn close(&self) {
        for strategy in &self.strategies {
            strategy.close().await;
        }
    }
}
