//! Page sources: where chapter and verse pages come from.

use std::path::{Path, PathBuf};

use reqwest::blocking::Client;

use crate::error::Result;
use crate::http::{create_client, download_text};

/// File name looked up inside a page directory.
const INDEX_FILE: &str = "index.html";

/// Something that can fetch a page by URL.
///
/// `Ok(None)` means the page does not exist. Errors are reserved for
/// failures of the source itself.
pub trait PageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Option<String>>;
}

/// Fetches pages over HTTP with retries.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    /// Create a source with a freshly configured client.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(create_client()?))
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl PageSource for HttpPageSource {
    fn fetch(&self, url: &str) -> Result<Option<String>> {
        download_text(&self.client, url)
    }
}

/// Reads pages from a mirrored directory tree.
///
/// The URL path below `base_url` maps to `{root}/{path}/index.html`, so
/// `https://example.org/lib/bg/1/advanced-view/` with base
/// `https://example.org/lib/` reads `{root}/bg/1/advanced-view/index.html`.
#[derive(Debug, Clone)]
pub struct DirPageSource {
    root: PathBuf,
    base_url: String,
}

impl DirPageSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Root directory of the mirror.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file backing a URL, if the URL lies below the base.
    #[must_use]
    pub fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.base_url)?;
        let relative = relative
            .split(['#', '?'])
            .next()
            .unwrap_or_default()
            .trim_matches('/');

        let mut path = self.root.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." {
                return None;
            }
            path.push(segment);
        }
        path.push(INDEX_FILE);
        Some(path)
    }
}

impl PageSource for DirPageSource {
    fn fetch(&self, url: &str) -> Result<Option<String>> {
        let Some(path) = self.path_for(url) else {
            tracing::debug!(url, base = %self.base_url, "URL outside mirrored base");
            return Ok(None);
        };
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "mirrored page missing");
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const BASE: &str = "https://example.org/lib/";

    #[test]
    fn test_path_for_maps_below_base() {
        let source = DirPageSource::new("/mirror", BASE);
        assert_eq!(
            source.path_for("https://example.org/lib/bg/1/advanced-view/"),
            Some(PathBuf::from("/mirror/bg/1/advanced-view/index.html"))
        );
        assert_eq!(
            source.path_for("https://example.org/lib/bg/1/advanced-view/#3"),
            Some(PathBuf::from("/mirror/bg/1/advanced-view/index.html"))
        );
    }

    #[test]
    fn test_path_for_rejects_foreign_and_parent_paths() {
        let source = DirPageSource::new("/mirror", BASE);
        assert_eq!(source.path_for("https://other.org/lib/bg/1/"), None);
        assert_eq!(source.path_for("https://example.org/lib/../etc/"), None);
    }

    #[test]
    fn test_fetch_existing_and_missing() {
        let dir = TempDir::new().unwrap();
        let page_dir = dir.path().join("bg").join("2");
        std::fs::create_dir_all(&page_dir).unwrap();
        std::fs::write(page_dir.join("index.html"), "<p>धर्म</p>").unwrap();

        let source = DirPageSource::new(dir.path(), BASE);
        assert_eq!(
            source.fetch("https://example.org/lib/bg/2/").unwrap(),
            Some("<p>धर्म</p>".to_string())
        );
        assert_eq!(source.fetch("https://example.org/lib/bg/3/").unwrap(), None);
    }
}
