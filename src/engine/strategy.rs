//! The fetch strategy contract shared by every fetch implementation

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// The fetch strategies, ordered cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Plain HTTP request
    Fast,
    /// Scripted headless browser
    Browser,
    /// Scripted headless browser with anti-detection hardening
    Stealth,
}

impl StrategyKind {
    /// All strategies in escalation order
    pub const ALL: [StrategyKind; 3] = [Self::Fast, Self::Browser, Self::Stealth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Browser => "browser",
            Self::Stealth => "stealth",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" | "http" => Ok(Self::Fast),
            "browser" => Ok(Self::Browser),
            "stealth" => Ok(Self::Stealth),
            other => Err(format!(
                "unknown engine '{}', expected one of: fast, browser, stealth",
                other
            )),
        }
    }
}

/// A single fetch handed to a strategy
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,

    /// Persisted authentication session to load before fetching
    pub session_path: Option<PathBuf>,
}

/// Raw response produced by a strategy
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub status_code: u16,

    /// URL after redirects
    pub final_url: String,
}

/// Errors raised by the fetch layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{strategy} fetch of {url} timed out")]
    Timeout { strategy: StrategyKind, url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Expected HTML from {url}, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser runtime unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Failed to load session {path}: {message}")]
    Session { path: String, message: String },

    #[error("All fetch strategies failed for {url}: {}", attempts.join("; "))]
    Exhausted { url: String, attempts: Vec<String> },
}

/// One way of turning a URL into HTML
///
/// Implementations own their underlying resources and release them in
/// [`FetchStrategy::close`]; the engine calls it exactly once on shutdown.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError>;

    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order_is_cheapest_first() {
        assert!(StrategyKind::Fast < StrategyKind::Browser);
        assert!(StrategyKind::Browser < StrategyKind::Stealth);
    }

    #[test]
    fn test_parse_strategy_kind() {
        assert_eq!("fast".parse::<StrategyKind>(), Ok(StrategyKind::Fast));
        assert_eq!("Stealth".parse::<StrategyKind>(), Ok(StrategyKind::Stealth));
        assert!("turbo".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_exhausted_message_lists_attempts() {
        let err = FetchError::Exhausted {
            url: "https://example.com/".to_string(),
            attempts: vec!["fast: blocked (rate_limit)".to_string(), "browser: timed out".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("fast: blocked (rate_limit)"));
        assert!(message.contains("browser: timed out"));
    }
}
