use url::Url;

/// Second-level labels that form part of a public suffix under a country TLD
/// (e.g. `co.uk`, `com.au`).
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu", "ne", "or"];

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_trawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable base domain of a host
///
/// `docs.example.com` and `www.example.com` both reduce to `example.com`;
/// `shop.example.co.uk` reduces to `example.co.uk`. IP addresses and
/// single-label hosts are returned unchanged.
///
/// # Examples
///
/// ```
/// use sumi_trawl::url::base_domain;
///
/// assert_eq!(base_domain("blog.example.com"), "example.com");
/// assert_eq!(base_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len().saturating_sub(keep)..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_base_domain_strips_subdomains() {
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("www.example.com"), "example.com");
        assert_eq!(base_domain("api.v2.example.com"), "example.com");
    }

    #[test]
    fn test_base_domain_country_suffix() {
        assert_eq!(base_domain("shop.example.co.uk"), "example.co.uk");
        assert_eq!(base_domain("example.com.au"), "example.com.au");
        assert_eq!(base_domain("de.example.io"), "example.io");
    }

    #[test]
    fn test_base_domain_ip_and_localhost() {
        assert_eq!(base_domain("127.0.0.1"), "127.0.0.1");
        assert_eq!(base_domain("localhost"), "localhost");
    }
}
