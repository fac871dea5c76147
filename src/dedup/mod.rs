//! Locale and near-duplicate suppression
//!
//! Sites often serve the same page under several locale prefixes,
//! subdomains or query parameters. This module maps those variants onto one
//! canonical key and keeps a single representative per key, preferring a
//! configured language.

mod codes;
mod locale;
mod tracker;

pub use codes::{is_country_code, is_language_code};
pub use locale::{extract_locale, LocaleInfo, LOCALE_PARAMS};
pub use tracker::{DedupTracker, SimilarityMatch, SkipDecision, DEFAULT_SIMILARITY_THRESHOLD};
