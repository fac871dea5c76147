//! Stored authentication sessions
//!
//! A session file is JSON of the form
//! `{ "cookies": [{ "name": "...", "value": "...", "domain": "...", "path": "/" }] }`.

use crate::engine::FetchError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
}

impl Session {
    /// Reads a session file
    pub async fn load(path: &Path) -> Result<Self, FetchError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FetchError::Session {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::parse(&content).map_err(|message| FetchError::Session {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Cookies that apply to the given host and path
    pub fn cookies_for<'a>(
        &'a self,
        host: &'a str,
        path: &'a str,
    ) -> impl Iterator<Item = &'a SessionCookie> + 'a {
        self.cookies
            .iter()
            .filter(move |c| cookie_domain_matches(c.domain.as_deref(), host))
            .filter(move |c| path.starts_with(c.path.as_deref().unwrap_or("/")))
    }

    /// Builds a `Cookie` header value, or `None` when no cookie applies
    pub fn cookie_header(&self, host: &str, path: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies_for(host, path)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

/// A cookie without a domain applies everywhere; `.example.com` and
/// `example.com` both cover subdomains.
fn cookie_domain_matches(domain: Option<&str>, host: &str) -> bool {
    let Some(domain) = domain else {
        return true;
    };
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SESSION: &str = r#"{
        "cookies": [
            {"name": "sid", "value": "abc", "domain": ".example.com", "path": "/"},
            {"name": "pref", "value": "dark", "domain": "example.com", "path": "/account"},
            {"name": "other", "value": "x", "domain": "other.org"}
        ]
    }"#;

    #[test]
    fn test_cookie_header_filters_domain_and_path() {
        let session = Session::parse(SESSION).unwrap();

        assert_eq!(
            session.cookie_header("www.example.com", "/blog").as_deref(),
            Some("sid=abc")
        );
        assert_eq!(
            session
                .cookie_header("example.com", "/account/settings")
                .as_deref(),
            Some("sid=abc; pref=dark")
        );
        assert!(session.cookie_header("unrelated.net", "/").is_none());
    }

    #[test]
    fn test_missing_cookies_field() {
        let session = Session::parse("{}").unwrap();
        assert!(session.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SESSION.as_bytes()).unwrap();

        let session = Session::load(file.path()).await.unwrap();
        assert_eq!(session.cookies.len(), 3);
    }

    #[tokio::test]
    async fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        assert!(matches!(
            Session::load(file.path()).await,
            Err(FetchError::Session { .. })
        ));
    }
}
