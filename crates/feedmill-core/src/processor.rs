//! Per-entry processing applied before entries are stored.
//!
//! Each entry is optionally crawled for its full content, then rewritten,
//! then sanitized. Crawl failures stay with the entry they happened on.

use crate::feed::{Cookies, Entry};
use crate::rewrite::Rewriter;
use crate::sanitizer::Sanitizer;
use crate::scraper::Scraper;
use crate::storage::Storage;

/// What happened to the entries of one processing pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Entries whose content was replaced by the crawled page
    pub crawled: usize,
    /// Entries not crawled because the user already has their URL
    pub skipped: usize,
    /// Entries whose crawl failed; their feed content was kept
    pub failed: usize,
}

pub struct FeedProcessor<'a> {
    user_id: i64,
    store: &'a dyn Storage,
    scraper: &'a Scraper,
    rewriter: &'a dyn Rewriter,
    sanitizer: &'a dyn Sanitizer,
    crawler: bool,
    scraper_rules: String,
    rewrite_rules: String,
    cookies: Cookies,
}

impl<'a> FeedProcessor<'a> {
    pub fn new(
        user_id: i64,
        store: &'a dyn Storage,
        scraper: &'a Scraper,
        rewriter: &'a dyn Rewriter,
        sanitizer: &'a dyn Sanitizer,
    ) -> Self {
        Self {
            user_id,
            store,
            scraper,
            rewriter,
            sanitizer,
            crawler: false,
            scraper_rules: String::new(),
            rewrite_rules: String::new(),
            cookies: Cookies::new(),
        }
    }

    pub fn with_crawler(mut self, crawler: bool) -> Self {
        self.crawler = crawler;
        self
    }

    pub fn with_scraper_rules(mut self, rules: &str) -> Self {
        self.scraper_rules = rules.to_string();
        self
    }

    pub fn with_rewrite_rules(mut self, rules: &str) -> Self {
        self.rewrite_rules = rules.to_string();
        self
    }

    /// The map is copied; later changes by the caller are not seen
    pub fn with_cookies(mut self, cookies: &Cookies) -> Self {
        self.cookies = cookies.clone();
        self
    }

    /// Crawl (when enabled), rewrite and sanitize every entry in place
    pub async fn process(&self, entries: &mut [Entry]) -> ProcessSummary {
        let mut summary = ProcessSummary::default();

        for entry in entries.iter_mut() {
            if self.crawler {
                self.crawl(entry, &mut summary).await;
            }

            entry.content = self
                .rewriter
                .rewrite(&entry.url, &entry.content, &self.rewrite_rules);
            entry.content = self.sanitizer.sanitize(&entry.url, &entry.content);
        }

        if self.crawler {
            tracing::debug!(
                crawled = summary.crawled,
                skipped = summary.skipped,
                failed = summary.failed,
                "Crawled entries for user {}",
                self.user_id
            );
        }

        summary
    }

    async fn crawl(&self, entry: &mut Entry, summary: &mut ProcessSummary) {
        match self.store.entry_url_exists(self.user_id, &entry.url).await {
            Ok(true) => {
                tracing::debug!("Entry {} already known, not crawling", entry.url);
                summary.skipped += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Unable to check entry {}: {}", entry.url, e);
                summary.failed += 1;
                return;
            }
        }

        match self
            .scraper
            .fetch(&entry.url, &self.scraper_rules, &self.cookies)
            .await
        {
            Ok(content) => {
                entry.content = content;
                summary.crawled += 1;
            }
            Err(e) => {
                tracing::warn!("Unable to crawl {}: {}", entry.url, e);
                summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::feed::{Feed, Icon};
    use crate::http::Fetcher;
    use crate::scraper::HeuristicExtractor;
    use crate::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Storage that knows a fixed set of entry URLs
    struct KnownUrls(Vec<String>);

    #[async_trait]
    impl Storage for KnownUrls {
        async fn category_exists(&self, _: i64, _: i64) -> Result<bool> {
            Ok(true)
        }
        async fn feed_url_exists(&self, _: i64, _: &str) -> Result<bool> {
            Ok(false)
        }
        async fn entry_url_exists(&self, _: i64, entry_url: &str) -> Result<bool> {
            Ok(self.0.iter().any(|u| u == entry_url))
        }
        async fn feed_by_id(&self, _: i64, _: i64) -> Result<Option<Feed>> {
            Ok(None)
        }
        async fn create_feed(&self, _: &mut Feed) -> Result<()> {
            Ok(())
        }
        async fn update_feed(&self, _: &Feed) -> Result<()> {
            Ok(())
        }
        async fn update_entries(&self, _: i64, _: i64, _: &[Entry], _: bool) -> Result<()> {
            Ok(())
        }
        async fn has_icon(&self, _: i64) -> Result<bool> {
            Ok(false)
        }
        async fn create_feed_icon(&self, _: &Feed, _: &Icon) -> Result<()> {
            Ok(())
        }
        async fn user_language(&self, _: i64) -> Result<String> {
            Ok("en_US".to_string())
        }
    }

    /// Tags content so the order of the stages is visible
    struct Tag(&'static str);

    impl Rewriter for Tag {
        fn rewrite(&self, _: &str, content: &str, _: &str) -> String {
            format!("{}[{}]", self.0, content)
        }
    }

    impl Sanitizer for Tag {
        fn sanitize(&self, _: &str, content: &str) -> String {
            format!("{}[{}]", self.0, content)
        }
    }

    fn scraper() -> Scraper {
        let fetcher = Fetcher::new(&HttpConfig::default()).unwrap();
        Scraper::new(fetcher, Arc::new(HeuristicExtractor))
    }

    fn entry(url: &str, content: &str) -> Entry {
        Entry {
            url: url.to_string(),
            content: content.to_string(),
            ..Entry::default()
        }
    }

    #[tokio::test]
    async fn test_rewrite_then_sanitize_without_crawler() {
        let store = KnownUrls(vec![]);
        let scraper = scraper();
        let (rewriter, sanitizer) = (Tag("rewrite"), Tag("sanitize"));
        let processor = FeedProcessor::new(1, &store, &scraper, &rewriter, &sanitizer);

        let mut entries = vec![entry("https://example.org/1", "summary")];
        let summary = processor.process(&mut entries).await;

        assert_eq!(entries[0].content, "sanitize[rewrite[summary]]");
        assert_eq!(summary, ProcessSummary::default());
    }

    #[tokio::test]
    async fn test_crawler_skips_known_urls_and_isolates_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/known"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body><article>Full</article></body></html>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let known = format!("{}/known", server.uri());
        let store = KnownUrls(vec![known.clone()]);
        let scraper = scraper();
        let (rewriter, sanitizer) = (Tag("rw"), Tag("s"));
        let processor = FeedProcessor::new(1, &store, &scraper, &rewriter, &sanitizer)
            .with_crawler(true)
            .with_scraper_rules("article");

        let mut entries = vec![
            entry(&known, "stored"),
            entry(&format!("{}/new", server.uri()), "summary"),
            entry(&format!("{}/broken", server.uri()), "kept"),
        ];
        let summary = processor.process(&mut entries).await;

        assert_eq!(entries[0].content, "s[rw[stored]]");
        assert_eq!(entries[1].content, "s[rw[Full]]");
        assert_eq!(entries[2].content, "s[rw[kept]]");
        assert_eq!(
            summary,
            ProcessSummary {
                crawled: 1,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_cookies_are_copied() {
        let store = KnownUrls(vec![]);
        let scraper = scraper();
        let mut cookies = Cookies::from([("a".to_string(), "1".to_string())]);
        let (rewriter, sanitizer) = (Tag("rw"), Tag("s"));
        let processor =
            FeedProcessor::new(1, &store, &scraper, &rewriter, &sanitizer).with_cookies(&cookies);

        cookies.insert("b".to_string(), "2".to_string());
        assert_eq!(processor.cookies.len(), 1);
    }
}
