//! Robots.txt handling module
//!
//! This module fetches, parses and evaluates robots.txt files. Records are
//! cached per origin for the lifetime of one crawl.

mod parser;
mod policy;

pub use parser::{pattern_matches, RobotsRecord, RuleGroup};
pub use policy::{RobotsError, RobotsPolicy, ROBOTS_TIMEOUT};
