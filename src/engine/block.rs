//! Anti-bot block page detection
//!
//! Classification runs over the status code and the raw body. Checks are
//! evaluated in a fixed priority order and the first match wins.

use crate::config::BlockDetectorConfig;
use crate::url::matches_wildcard;
use std::fmt;

const CHALLENGE_MARKERS: &[&str] = &[
    "challenge-platform",
    "cf-browser-verification",
    "cf_chl_opt",
    "cf-challenge",
    "_cf_chl",
    "checking your browser",
    "just a moment...",
];

const CAPTCHA_MARKERS: &[&str] = &[
    "captcha",
    "g-recaptcha",
    "h-captcha",
    "hcaptcha",
    "turnstile",
    "are you a robot",
    "are you human",
    "verify you are human",
];

const CLOUDFLARE_MARKERS: &[&str] = &[
    "cloudflare",
    "cf-ray",
    "__cf_bm",
    "cf-chl",
    "challenge-platform",
    "attention required",
];

const DATADOME_MARKERS: &[&str] = &[
    "datadome",
    "captcha-delivery.com",
    "geo.captcha-delivery",
    "dd.js",
];

const PERIMETERX_MARKERS: &[&str] = &[
    "perimeterx",
    "px-captcha",
    "_pxhd",
    "px-cdn",
    "press & hold",
];

const AKAMAI_MARKERS: &[&str] = &[
    "akamai",
    "_abck",
    "ak_bmsc",
    "bm_sz",
    "reference&#32;&#35;",
];

const ACCESS_DENIED_MARKERS: &[&str] = &[
    "access denied",
    "access to this page has been denied",
    "you have been blocked",
    "request blocked",
    "bot detected",
    "automated access",
    "unusual traffic",
];

const JAVASCRIPT_MARKERS: &[&str] = &[
    "enable javascript",
    "javascript is required",
    "javascript is disabled",
    "please enable js",
];

/// Why a response was classified as blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    Forbidden,
    RateLimit,
    Cloudflare,
    EmptyBody,
    DataDome,
    PerimeterX,
    Akamai,
    Captcha,
    AccessDenied,
    JavascriptRequired,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::RateLimit => "rate_limit",
            Self::Cloudflare => "cloudflare",
            Self::EmptyBody => "empty_body",
            Self::DataDome => "datadome",
            Self::PerimeterX => "perimeterx",
            Self::Akamai => "akamai",
            Self::Captcha => "captcha",
            Self::AccessDenied => "access_denied",
            Self::JavascriptRequired => "javascript_required",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockVerdict {
    pub blocked: bool,
    pub reason: Option<BlockReason>,

    /// Estimated probability that the page is a block page (0..=1)
    pub confidence: f32,
}

impl BlockVerdict {
    pub fn clear() -> Self {
        Self {
            blocked: false,
            reason: None,
            confidence: 0.0,
        }
    }

    fn blocked(reason: BlockReason, confidence: f32) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
            confidence,
        }
    }
}

/// Heuristic classifier for anti-bot challenge and block pages
#[derive(Debug, Clone)]
pub struct BlockDetector {
    config: BlockDetectorConfig,
    protected_domains: Vec<String>,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::new(BlockDetectorConfig::default(), Vec::new())
    }
}

impl BlockDetector {
    pub fn new(config: BlockDetectorConfig, protected_domains: Vec<String>) -> Self {
        Self {
            config,
            protected_domains,
        }
    }

    /// Classifies a response as blocked or not
    ///
    /// # Decision order
    ///
    /// | Check | Reason | Confidence |
    /// |-------|--------|------------|
    /// | status 403 | forbidden | 0.9 |
    /// | status 429 | rate_limit | 0.95 |
    /// | status 503 + challenge marker | cloudflare | 0.95 |
    /// | short body + challenge/captcha marker | empty_body | 0.7 |
    /// | two markers of one provider | provider | 0.8-0.9 |
    /// | two captcha markers on a small body | captcha | 0.85 |
    /// | bot-defense phrasing on a very short body | access_denied | 0.7 |
    /// | enable-JavaScript notice, no article/main | javascript_required | 0.6 |
    pub fn classify(&self, body: &str, status_code: u16, url: &str) -> BlockVerdict {
        let cfg = &self.config;

        if status_code == 403 {
            return BlockVerdict::blocked(BlockReason::Forbidden, cfg.forbidden_confidence);
        }

        if status_code == 429 {
            return BlockVerdict::blocked(BlockReason::RateLimit, cfg.rate_limit_confidence);
        }

        let lower = body.to_lowercase();
        let length = body.len();

        if status_code == 503 && count_markers(&lower, CHALLENGE_MARKERS) >= 1 {
            return BlockVerdict::blocked(BlockReason::Cloudflare, cfg.challenge_confidence);
        }

        if length < cfg.min_substantive_length
            && (count_markers(&lower, CHALLENGE_MARKERS) > 0
                || count_markers(&lower, CAPTCHA_MARKERS) > 0)
        {
            return BlockVerdict::blocked(BlockReason::EmptyBody, cfg.empty_body_confidence);
        }

        if length < cfg.provider_length_ceiling {
            let providers = [
                (CLOUDFLARE_MARKERS, BlockReason::Cloudflare, 0.9),
                (DATADOME_MARKERS, BlockReason::DataDome, 0.9),
                (PERIMETERX_MARKERS, BlockReason::PerimeterX, 0.85),
                (AKAMAI_MARKERS, BlockReason::Akamai, 0.8),
            ];

            for (markers, reason, confidence) in providers {
                if count_markers(&lower, markers) >= 2 {
                    tracing::debug!("{} markers found on {}", reason, url);
                    return BlockVerdict::blocked(reason, confidence);
                }
            }
        }

        if length < cfg.captcha_length_ceiling && count_markers(&lower, CAPTCHA_MARKERS) >= 2 {
            return BlockVerdict::blocked(BlockReason::Captcha, cfg.captcha_confidence);
        }

        if length < cfg.short_body_length && count_markers(&lower, ACCESS_DENIED_MARKERS) > 0 {
            return BlockVerdict::blocked(BlockReason::AccessDenied, cfg.access_denied_confidence);
        }

        if length < cfg.js_required_length
            && count_markers(&lower, JAVASCRIPT_MARKERS) > 0
            && !lower.contains("<article")
            && !lower.contains("<main")
        {
            return BlockVerdict::blocked(
                BlockReason::JavascriptRequired,
                cfg.javascript_confidence,
            );
        }

        BlockVerdict::clear()
    }

    /// Returns true if the host is known to need a scripted browser
    pub fn requires_browser(&self, host: &str) -> bool {
        self.protected_domains
            .iter()
            .any(|pattern| matches_wildcard(pattern, host))
    }
}

/// Counts how many distinct markers occur in the lower-cased body
fn count_markers(lower_body: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|m| lower_body.contains(*m)).count()
}
