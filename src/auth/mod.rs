//! Stored authentication sessions
//!
//! The crawler never logs in. It only asks whether a session was stored
//! for a domain and where, then hands that path to the fetch engine.

use std::path::PathBuf;

/// Read-only view of stored sessions
pub trait AuthStore: Send + Sync {
    fn has_session(&self, domain: &str) -> bool;

    fn session_path(&self, domain: &str) -> PathBuf;
}

/// One `<domain>.json` file per domain in a directory
///
/// A leading `www.` is ignored, so `www.example.com` and `example.com`
/// share a session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AuthStore for FileSessionStore {
    fn has_session(&self, domain: &str) -> bool {
        self.session_path(domain).is_file()
    }

    fn session_path(&self, domain: &str) -> PathBuf {
        let domain = domain.to_ascii_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        let file: String = domain
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_lookup() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path());

        assert!(!store.has_session("example.com"));
        std::fs::write(dir.path().join("example.com.json"), r#"{"cookies":[]}"#).unwrap();

        assert!(store.has_session("example.com"));
        assert!(store.has_session("WWW.Example.com"));
        assert!(!store.has_session("other.com"));
    }

    #[test]
    fn test_path_is_confined_to_dir() {
        let store = FileSessionStore::new("/sessions");
        assert_eq!(
            store.session_path("../etc/passwd"),
            PathBuf::from("/sessions/.._etc_passwd.json")
        );
        assert_eq!(
            store.session_path("example.com:8080"),
            PathBuf::from("/sessions/example.com_8080.json")
        );
    }
}
