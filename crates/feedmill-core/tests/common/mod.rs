#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use feedmill_core::feed::{Entry, Feed, FeedParser, FeedRsParser, Icon};
use feedmill_core::icon::IconFinder;
use feedmill_core::storage::{Database, Storage};
use feedmill_core::{AppConfig, FeedHandler, Result};

/// SQLite storage that counts the writes made to feed rows
pub struct RecordingStore {
    pub db: Database,
    pub feed_updates: AtomicUsize,
    pub feed_creations: AtomicUsize,
}

impl RecordingStore {
    pub async fn new() -> Self {
        Self {
            db: Database::new_in_memory().await.unwrap(),
            feed_updates: AtomicUsize::new(0),
            feed_creations: AtomicUsize::new(0),
        }
    }

    pub fn updates(&self) -> usize {
        self.feed_updates.load(Ordering::SeqCst)
    }

    pub fn creations(&self) -> usize {
        self.feed_creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for RecordingStore {
    async fn category_exists(&self, user_id: i64, category_id: i64) -> Result<bool> {
        self.db.category_exists(user_id, category_id).await
    }

    async fn feed_url_exists(&self, user_id: i64, feed_url: &str) -> Result<bool> {
        self.db.feed_url_exists(user_id, feed_url).await
    }

    async fn entry_url_exists(&self, user_id: i64, entry_url: &str) -> Result<bool> {
        self.db.entry_url_exists(user_id, entry_url).await
    }

    async fn feed_by_id(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        self.db.feed_by_id(user_id, feed_id).await
    }

    async fn create_feed(&self, feed: &mut Feed) -> Result<()> {
        self.feed_creations.fetch_add(1, Ordering::SeqCst);
        self.db.create_feed(feed).await
    }

    async fn update_feed(&self, feed: &Feed) -> Result<()> {
        self.feed_updates.fetch_add(1, Ordering::SeqCst);
        self.db.update_feed(feed).await
    }

    async fn update_entries(
        &self,
        user_id: i64,
        feed_id: i64,
        entries: &[Entry],
        update_existing: bool,
    ) -> Result<()> {
        self.db
            .update_entries(user_id, feed_id, entries, update_existing)
            .await
    }

    async fn has_icon(&self, feed_id: i64) -> Result<bool> {
        self.db.has_icon(feed_id).await
    }

    async fn create_feed_icon(&self, feed: &Feed, icon: &Icon) -> Result<()> {
        self.db.create_feed_icon(feed, icon).await
    }

    async fn user_language(&self, user_id: i64) -> Result<String> {
        self.db.user_language(user_id).await
    }
}

/// `feed-rs` parser that counts its calls
#[derive(Default)]
pub struct CountingParser {
    calls: AtomicUsize,
}

impl CountingParser {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedParser for CountingParser {
    fn parse(&self, body: &str) -> Result<Feed> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FeedRsParser.parse(body)
    }
}

/// Icon finder answering without network access
pub struct StaticIconFinder(pub Option<Icon>);

#[async_trait]
impl IconFinder for StaticIconFinder {
    async fn find_icon(&self, _site_url: &str) -> Result<Option<Icon>> {
        Ok(self.0.clone())
    }
}

pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub parser: Arc<CountingParser>,
    pub handler: FeedHandler,
}

pub async fn harness() -> Harness {
    harness_with_icon(None).await
}

pub async fn harness_with_icon(icon: Option<Icon>) -> Harness {
    let store = Arc::new(RecordingStore::new().await);
    let parser = Arc::new(CountingParser::default());

    let handler = FeedHandler::new(store.clone(), &AppConfig::default())
        .unwrap()
        .with_parser(parser.clone())
        .with_icon_finder(Arc::new(StaticIconFinder(icon)));

    Harness {
        store,
        parser,
        handler,
    }
}

/// RSS document with `(guid, link, description)` items
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(guid, link, description)| {
            format!(
                "<item><guid>{}</guid><title>{}</title><link>{}</link><description><![CDATA[{}]]></description></item>",
                guid, guid, link, description
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test feed</title><link>https://example.org/</link>{}</channel></rss>"#,
        items
    )
}

pub fn html(body: &str) -> String {
    format!("<html><body>{}</body></html>", body)
}
