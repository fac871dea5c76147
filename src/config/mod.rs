//! Configuration module for Sumi-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so an empty file (or no file at all) is a valid
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use sumi_trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Crawler will follow links {} levels deep", config.crawler.depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AuthConfig, BlockDetectorConfig, Config, CrawlerConfig, EngineConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
