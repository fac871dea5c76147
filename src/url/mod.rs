//! URL handling module for Sumi-Trawl
//!
//! This module provides URL normalization, domain extraction, wildcard host
//! matching, and the resource/pattern filters used during admission.

mod domain;
mod matcher;
mod normalize;

pub use domain::{base_domain, extract_domain};
pub use matcher::{is_resource_url, matches_wildcard, UrlPatterns};
pub use normalize::normalize_url;

/// Returns the base domain of a URL, if it has a host
pub fn url_base_domain(url: &::url::Url) -> Option<String> {
    url.host_str().map(base_domain)
}
