//! Fetch engine
//!
//! This module turns a URL into HTML through an escalating chain of fetch
//! strategies:
//! - Plain HTTP (cheapest)
//! - Scripted headless browser
//! - Stealth-hardened headless browser
//!
//! Every response is screened by the [`BlockDetector`]; blocked or failed
//! attempts escalate to the next strategy.

mod block;
mod browser;
mod http;
mod session;
mod stats;
mod strategy;
mod waterfall;

pub use block::{BlockDetector, BlockReason, BlockVerdict};
pub use browser::{BrowserRuntime, BrowserStrategy};
pub use http::{build_http_client, HttpStrategy};
pub use session::{Session, SessionCookie};
pub use stats::{EngineStats, EngineStatsSnapshot};
pub use strategy::{FetchError, FetchRequest, FetchStrategy, FetchedPage, StrategyKind};
pub use waterfall::{Engine, EngineResponse, FetchOptions};
