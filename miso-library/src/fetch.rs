//! Clip resource fetching

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::loader::ClipError;

const USER_AGENT: &str = concat!("miso/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Source of encoded clip bytes, addressed by relative path
/// (`clips/{noise}.{format}`)
pub trait ClipFetcher: Send {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError>;
}

impl<F: ClipFetcher + ?Sized> ClipFetcher for Box<F> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
        (**self).fetch(path)
    }
}

/// Reads clips from a directory on disk
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClipFetcher for DirFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
        let full = self.root.join(path);
        debug!(path = %full.display(), "reading clip");
        std::fs::read(&full).map_err(|e| ClipError::Network(format!("{}: {}", full.display(), e)))
    }
}

/// Fetches clips over HTTP(S) relative to a base URL
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(base_url: &str) -> Result<Self, ClipError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClipError::Network(friendly_network_error(&e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl ClipFetcher for HttpFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
        let url = self.url_for(path);
        debug!(%url, "fetching clip");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ClipError::Network(friendly_network_error(&e)))?;

        if !response.status().is_success() {
            return Err(ClipError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| ClipError::Network(friendly_network_error(&e)))?;
        Ok(body.to_vec())
    }
}

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    format!("{e}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_fetcher_reads_clip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("clips")).unwrap();
        std::fs::write(dir.path().join("clips/red.ogg"), b"abc").unwrap();

        let fetcher = DirFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("clips/red.ogg").unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_dir_fetcher_missing_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = DirFetcher::new(dir.path());
        let err = fetcher.fetch("clips/blue.ogg").unwrap_err();
        assert!(matches!(err, ClipError::Network(_)));
    }

    #[test]
    fn test_http_url_joining() {
        let fetcher = HttpFetcher::new("https://example.org/miso/").unwrap();
        assert_eq!(
            fetcher.url_for("clips/white.mp3"),
            "https://example.org/miso/clips/white.mp3"
        );
    }

    #[test]
    fn test_http_unreachable_is_network_error() {
        // Port 9 (discard) on localhost is closed on test machines
        let fetcher = HttpFetcher::new("http://127.0.0.1:9").unwrap();
        let err = fetcher.fetch("clips/white.ogg").unwrap_err();
        assert!(matches!(err, ClipError::Network(_)));
    }
}
