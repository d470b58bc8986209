//! Persistence boundary of the refresh pipeline, with a SQLite backend.

mod category_repo;
mod database;
mod entry_repo;
mod feed_repo;
mod icon_repo;
mod retry;

use async_trait::async_trait;

pub use category_repo::CategoryRepository;
pub use database::{Database, DEFAULT_CATEGORY_ID, DEFAULT_USER_ID};
pub use entry_repo::EntryRepository;
pub use feed_repo::{FeedRepository, MAX_PARSING_ERROR};
pub use icon_repo::IconRepository;

use crate::feed::{Category, Entry, Feed, Icon};
use crate::Result;

/// What feed creation and refresh need from storage.
///
/// Each call is treated as atomic. Nothing here serializes concurrent
/// refreshes of the same feed.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn category_exists(&self, user_id: i64, category_id: i64) -> Result<bool>;

    async fn feed_url_exists(&self, user_id: i64, feed_url: &str) -> Result<bool>;

    /// Whether any feed of the user has an entry with this URL
    async fn entry_url_exists(&self, user_id: i64, entry_url: &str) -> Result<bool>;

    async fn feed_by_id(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>>;

    /// Persist a new feed with its entries, assigning ids
    async fn create_feed(&self, feed: &mut Feed) -> Result<()>;

    async fn update_feed(&self, feed: &Feed) -> Result<()>;

    /// Add new entries; overwrite existing ones only if `update_existing`
    async fn update_entries(
        &self,
        user_id: i64,
        feed_id: i64,
        entries: &[Entry],
        update_existing: bool,
    ) -> Result<()>;

    async fn has_icon(&self, feed_id: i64) -> Result<bool>;

    async fn create_feed_icon(&self, feed: &Feed, icon: &Icon) -> Result<()>;

    async fn user_language(&self, user_id: i64) -> Result<String>;
}

#[async_trait]
impl Storage for Database {
    async fn category_exists(&self, user_id: i64, category_id: i64) -> Result<bool> {
        CategoryRepository::new(self).exists(user_id, category_id).await
    }

    async fn feed_url_exists(&self, user_id: i64, feed_url: &str) -> Result<bool> {
        FeedRepository::new(self).url_exists(user_id, feed_url).await
    }

    async fn entry_url_exists(&self, user_id: i64, entry_url: &str) -> Result<bool> {
        EntryRepository::new(self).url_exists(user_id, entry_url).await
    }

    async fn feed_by_id(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        FeedRepository::new(self).find_by_id(user_id, feed_id).await
    }

    async fn create_feed(&self, feed: &mut Feed) -> Result<()> {
        FeedRepository::new(self).create(feed).await
    }

    async fn update_feed(&self, feed: &Feed) -> Result<()> {
        FeedRepository::new(self).update(feed).await
    }

    async fn update_entries(
        &self,
        user_id: i64,
        feed_id: i64,
        entries: &[Entry],
        update_existing: bool,
    ) -> Result<()> {
        EntryRepository::new(self)
            .merge(user_id, feed_id, entries, update_existing)
            .await
    }

    async fn has_icon(&self, feed_id: i64) -> Result<bool> {
        IconRepository::new(self).feed_has_icon(feed_id).await
    }

    async fn create_feed_icon(&self, feed: &Feed, icon: &Icon) -> Result<()> {
        IconRepository::new(self).attach(feed.id, icon).await?;
        Ok(())
    }

    async fn user_language(&self, user_id: i64) -> Result<String> {
        CategoryRepository::new(self).user_language(user_id).await
    }
}

/// Feed management outside the refresh pipeline
impl Database {
    pub async fn feeds(&self, user_id: i64) -> Result<Vec<Feed>> {
        FeedRepository::new(self).list_by_user(user_id).await
    }

    pub async fn remove_feed(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        FeedRepository::new(self).delete(user_id, feed_id).await
    }

    /// Feeds that failed [`MAX_PARSING_ERROR`] times or more in a row
    pub async fn count_error_feeds(&self, user_id: i64) -> Result<i64> {
        FeedRepository::new(self).count_with_errors(user_id).await
    }

    pub async fn reset_feed_errors(&self) -> Result<u64> {
        FeedRepository::new(self).reset_errors().await
    }

    pub async fn entries(&self, user_id: i64, feed_id: i64) -> Result<Vec<Entry>> {
        EntryRepository::new(self).list_by_feed(user_id, feed_id).await
    }

    pub async fn feed_icon(&self, feed_id: i64) -> Result<Option<Icon>> {
        IconRepository::new(self).find_by_feed(feed_id).await
    }

    pub async fn create_category(&self, user_id: i64, title: &str) -> Result<Category> {
        CategoryRepository::new(self).create(user_id, title).await
    }

    pub async fn categories(&self, user_id: i64) -> Result<Vec<Category>> {
        CategoryRepository::new(self).list_by_user(user_id).await
    }

    pub async fn create_user(&self, username: &str, language: &str) -> Result<i64> {
        CategoryRepository::new(self).create_user(username, language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Cookies;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn entry(hash: &str, url: &str, content: &str) -> Entry {
        Entry {
            hash: hash.to_string(),
            url: url.to_string(),
            title: hash.to_string(),
            content: content.to_string(),
            ..Entry::default()
        }
    }

    fn new_feed(url: &str) -> Feed {
        Feed {
            user_id: DEFAULT_USER_ID,
            category: Category {
                id: DEFAULT_CATEGORY_ID,
                ..Category::default()
            },
            feed_url: url.to_string(),
            site_url: "https://example.org/".to_string(),
            title: "Example".to_string(),
            entries: vec![entry("1", "https://example.org/1", "one")],
            ..Feed::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_load_feed() {
        let db = Database::new_in_memory().await.unwrap();

        let mut feed = new_feed("https://example.org/feed.xml");
        feed.cookies = Cookies::from([("session".to_string(), "abc".to_string())]);
        feed.crawler = true;
        db.create_feed(&mut feed).await.unwrap();
        assert!(feed.id > 0);
        assert_eq!(feed.entries[0].feed_id, feed.id);

        let loaded = db.feed_by_id(DEFAULT_USER_ID, feed.id).await.unwrap().unwrap();
        assert_eq!(loaded.feed_url, "https://example.org/feed.xml");
        assert_eq!(loaded.category.title, "All");
        assert_eq!(loaded.cookies.get("session").map(String::as_str), Some("abc"));
        assert!(loaded.crawler);
        assert!(loaded.icon.is_none());

        assert!(db
            .feed_url_exists(DEFAULT_USER_ID, "https://example.org/feed.xml")
            .await
            .unwrap());
        assert!(db
            .entry_url_exists(DEFAULT_USER_ID, "https://example.org/1")
            .await
            .unwrap());
        assert!(!db.entry_url_exists(2, "https://example.org/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_feed_url_unique_per_user() {
        let db = Database::new_in_memory().await.unwrap();
        db.create_feed(&mut new_feed("https://example.org/feed.xml")).await.unwrap();

        let result = db.create_feed(&mut new_feed("https://example.org/feed.xml")).await;
        assert!(matches!(result, Err(crate::Error::Database(_))));
    }

    #[tokio::test]
    async fn test_feed_by_id_is_scoped_to_user() {
        let db = Database::new_in_memory().await.unwrap();
        let mut feed = new_feed("https://example.org/feed.xml");
        db.create_feed(&mut feed).await.unwrap();

        assert!(db.feed_by_id(42, feed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_feed_error_state() {
        let db = Database::new_in_memory().await.unwrap();
        let mut feed = new_feed("https://example.org/feed.xml");
        db.create_feed(&mut feed).await.unwrap();

        let checked_at = Utc::now();
        feed.checked_at = Some(checked_at);
        feed.record_failure("boom");
        db.update_feed(&feed).await.unwrap();

        let loaded = db.feed_by_id(DEFAULT_USER_ID, feed.id).await.unwrap().unwrap();
        assert_eq!(loaded.parsing_error_count, 1);
        assert_eq!(loaded.parsing_error_msg, "boom");
        assert_eq!(
            loaded.checked_at.map(|t| t.timestamp()),
            Some(checked_at.timestamp())
        );
    }

    #[tokio::test]
    async fn test_update_entries_respects_overwrite_flag() {
        let db = Database::new_in_memory().await.unwrap();
        let mut feed = new_feed("https://example.org/feed.xml");
        db.create_feed(&mut feed).await.unwrap();

        let refreshed = vec![
            entry("1", "https://example.org/1", "summary only"),
            entry("2", "https://example.org/2", "two"),
        ];

        db.update_entries(DEFAULT_USER_ID, feed.id, &refreshed, false)
            .await
            .unwrap();
        let entries = db.entries(DEFAULT_USER_ID, feed.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        let first = entries.iter().find(|e| e.hash == "1").unwrap();
        assert_eq!(first.content, "one");

        db.update_entries(DEFAULT_USER_ID, feed.id, &refreshed, true)
            .await
            .unwrap();
        let entries = db.entries(DEFAULT_USER_ID, feed.id).await.unwrap();
        let first = entries.iter().find(|e| e.hash == "1").unwrap();
        assert_eq!(first.content, "summary only");
    }

    #[tokio::test]
    async fn test_feed_icon() {
        let db = Database::new_in_memory().await.unwrap();
        let mut feed = new_feed("https://example.org/feed.xml");
        db.create_feed(&mut feed).await.unwrap();
        assert!(!db.has_icon(feed.id).await.unwrap());

        let icon = Icon {
            id: 0,
            mime_type: "image/png".to_string(),
            content: vec![1, 2, 3],
        };
        db.create_feed_icon(&feed, &icon).await.unwrap();
        db.create_feed_icon(&feed, &icon).await.unwrap();

        assert!(db.has_icon(feed.id).await.unwrap());
        let stored = db.feed_icon(feed.id).await.unwrap().unwrap();
        assert_eq!(stored.content, vec![1, 2, 3]);

        let other = Icon {
            id: 0,
            mime_type: "image/x-icon".to_string(),
            content: vec![9, 9],
        };
        db.create_feed_icon(&feed, &other).await.unwrap();
        let kept = db.feed_icon(feed.id).await.unwrap().unwrap();
        assert_eq!(kept.id, stored.id);
        assert_eq!(kept.content, vec![1, 2, 3]);

        let (icons,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM icons")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(icons, 1);

        let loaded = db.feed_by_id(DEFAULT_USER_ID, feed.id).await.unwrap().unwrap();
        assert_eq!(loaded.icon.map(|i| i.icon_id), Some(stored.id));
    }

    #[tokio::test]
    async fn test_error_feeds_and_listing_order() {
        let db = Database::new_in_memory().await.unwrap();

        let mut healthy = new_feed("https://a.example.org/feed.xml");
        healthy.title = "Alpha".to_string();
        db.create_feed(&mut healthy).await.unwrap();

        let mut broken = new_feed("https://b.example.org/feed.xml");
        broken.title = "Beta".to_string();
        db.create_feed(&mut broken).await.unwrap();
        for _ in 0..MAX_PARSING_ERROR {
            broken.record_failure("down");
        }
        db.update_feed(&broken).await.unwrap();

        let titles: Vec<String> = db
            .feeds(DEFAULT_USER_ID)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["Beta".to_string(), "Alpha".to_string()]);

        assert_eq!(db.count_error_feeds(DEFAULT_USER_ID).await.unwrap(), 1);
        assert_eq!(db.reset_feed_errors().await.unwrap(), 1);
        assert_eq!(db.count_error_feeds(DEFAULT_USER_ID).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_feed_removes_entries() {
        let db = Database::new_in_memory().await.unwrap();
        let mut feed = new_feed("https://example.org/feed.xml");
        db.create_feed(&mut feed).await.unwrap();

        assert!(db.remove_feed(DEFAULT_USER_ID, feed.id).await.unwrap());
        assert!(!db.remove_feed(DEFAULT_USER_ID, feed.id).await.unwrap());
        assert!(!db
            .entry_url_exists(DEFAULT_USER_ID, "https://example.org/1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_categories_and_languages() {
        let db = Database::new_in_memory().await.unwrap();

        let category = db.create_category(DEFAULT_USER_ID, "News").await.unwrap();
        assert!(db.category_exists(DEFAULT_USER_ID, category.id).await.unwrap());
        assert!(!db.category_exists(DEFAULT_USER_ID, 999).await.unwrap());

        let titles: Vec<String> = db
            .categories(DEFAULT_USER_ID)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["All".to_string(), "News".to_string()]);

        let user_id = db.create_user("marie", "fr_FR").await.unwrap();
        assert_eq!(db.user_language(user_id).await.unwrap(), "fr_FR");
        assert_eq!(db.user_language(DEFAULT_USER_ID).await.unwrap(), "en_US");
        assert!(!db.category_exists(user_id, category.id).await.unwrap());
    }
}
