//! Process-wide cache of fetched resource text.
//!
//! Stylesheets and scripts shared between applications are fetched once and
//! served from here afterwards. Documents themselves are never cached — the
//! pipeline always refetches HTML.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use super::fetch::Fetch;

/// URL-keyed cache of fetched text.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: DashMap<String, Arc<str>>,
}

impl SourceCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached text for `url`, if any.
    pub fn get(&self, url: &str) -> Option<Arc<str>> {
        self.entries.get(url).map(|entry| entry.clone())
    }

    /// Store text for `url`.
    pub fn insert(&self, url: impl Into<String>, text: impl Into<Arc<str>>) {
        self.entries.insert(url.into(), text.into());
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch `url` through the cache.
    pub async fn fetch(&self, url: &str, app_name: &str, fetcher: &dyn Fetch) -> Result<Arc<str>> {
        if let Some(hit) = self.get(url) {
            debug!(app = app_name, "cache hit for {url}");
            return Ok(hit);
        }
        let text: Arc<str> = fetcher.fetch_text(url, app_name).await?.into();
        self.entries.insert(url.to_string(), text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetch for CountingFetcher {
        async fn fetch_text(&self, url: &str, _app_name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("body of {url}"))
        }
    }

    #[test]
    fn test_fetch_hits_network_once_per_url() {
        let cache = SourceCache::new();
        let fetcher = CountingFetcher {
            calls: AtomicUsize::new(0),
        };

        let first = tokio_test::block_on(cache.fetch("https://x.test/a.css", "app", &fetcher));
        let second = tokio_test::block_on(cache.fetch("https://x.test/a.css", "other", &fetcher));
        assert_eq!(first.unwrap().as_ref(), "body of https://x.test/a.css");
        assert_eq!(second.unwrap().as_ref(), "body of https://x.test/a.css");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        tokio_test::block_on(cache.fetch("https://x.test/b.css", "app", &fetcher)).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}
