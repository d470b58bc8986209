use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::feed::{Category, Cookies, Feed, FeedIcon};
use crate::Result;

/// Feeds with at least this many consecutive failures are reported as broken
pub const MAX_PARSING_ERROR: u32 = 3;

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: i64,
    user_id: i64,
    category_id: i64,
    category_title: String,
    feed_url: String,
    site_url: String,
    title: String,
    etag_header: String,
    last_modified_header: String,
    checked_at: Option<DateTime<Utc>>,
    parsing_error_count: i64,
    parsing_error_msg: String,
    scraper_rules: String,
    rewrite_rules: String,
    cookies: String,
    crawler: bool,
    username: String,
    password: String,
    icon_id: Option<i64>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            user_id: row.user_id,
            category: Category {
                id: row.category_id,
                user_id: row.user_id,
                title: row.category_title,
            },
            feed_url: row.feed_url,
            site_url: row.site_url,
            title: row.title,
            etag_header: row.etag_header,
            last_modified_header: row.last_modified_header,
            checked_at: row.checked_at,
            parsing_error_count: row.parsing_error_count.max(0) as u32,
            parsing_error_msg: row.parsing_error_msg,
            scraper_rules: row.scraper_rules,
            rewrite_rules: row.rewrite_rules,
            cookies: decode_cookies(&row.cookies),
            crawler: row.crawler,
            username: row.username,
            password: row.password,
            icon: row.icon_id.map(|icon_id| FeedIcon {
                feed_id: row.id,
                icon_id,
            }),
            entries: Vec::new(),
        }
    }
}

const SELECT_FEEDS: &str = r#"
    SELECT f.id, f.user_id, f.category_id, c.title AS category_title,
           f.feed_url, f.site_url, f.title, f.etag_header, f.last_modified_header,
           f.checked_at, f.parsing_error_count, f.parsing_error_msg,
           f.scraper_rules, f.rewrite_rules, f.cookies, f.crawler,
           f.username, f.password, fi.icon_id
    FROM feeds f
    JOIN categories c ON c.id = f.category_id
    LEFT JOIN feed_icons fi ON fi.feed_id = f.id
"#;

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert the feed and its entries; sets the new ids on `feed`
    pub async fn create(&self, feed: &mut Feed) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO feeds
            (user_id, category_id, feed_url, site_url, title, etag_header, last_modified_header,
             checked_at, scraper_rules, rewrite_rules, cookies, crawler, username, password)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(feed.user_id)
        .bind(feed.category.id)
        .bind(&feed.feed_url)
        .bind(&feed.site_url)
        .bind(&feed.title)
        .bind(&feed.etag_header)
        .bind(&feed.last_modified_header)
        .bind(feed.checked_at)
        .bind(&feed.scraper_rules)
        .bind(&feed.rewrite_rules)
        .bind(serde_json::to_string(&feed.cookies)?)
        .bind(feed.crawler)
        .bind(&feed.username)
        .bind(&feed.password)
        .execute(&mut *tx)
        .await?;

        feed.id = result.last_insert_rowid();

        for entry in &mut feed.entries {
            entry.user_id = feed.user_id;
            entry.feed_id = feed.id;

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO entries
                (user_id, feed_id, hash, url, title, author, content, published_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.feed_id)
            .bind(&entry.hash)
            .bind(&entry.url)
            .bind(&entry.title)
            .bind(&entry.author)
            .bind(&entry.content)
            .bind(entry.published_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                entry.id = result.last_insert_rowid();
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Write every mutable column of the feed row
    pub async fn update(&self, feed: &Feed) -> Result<()> {
        let pool = self.db.pool().clone();
        let cookies = serde_json::to_string(&feed.cookies)?;

        with_retry(|| {
            let pool = pool.clone();
            let cookies = cookies.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE feeds
                    SET category_id = ?,
                        feed_url = ?,
                        site_url = ?,
                        title = ?,
                        etag_header = ?,
                        last_modified_header = ?,
                        checked_at = ?,
                        parsing_error_count = ?,
                        parsing_error_msg = ?,
                        scraper_rules = ?,
                        rewrite_rules = ?,
                        cookies = ?,
                        crawler = ?,
                        username = ?,
                        password = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(feed.category.id)
                .bind(&feed.feed_url)
                .bind(&feed.site_url)
                .bind(&feed.title)
                .bind(&feed.etag_header)
                .bind(&feed.last_modified_header)
                .bind(feed.checked_at)
                .bind(feed.parsing_error_count as i64)
                .bind(&feed.parsing_error_msg)
                .bind(&feed.scraper_rules)
                .bind(&feed.rewrite_rules)
                .bind(cookies)
                .bind(feed.crawler)
                .bind(&feed.username)
                .bind(&feed.password)
                .bind(feed.id)
                .bind(feed.user_id)
                .execute(&pool)
                .await
                .map(|_| ())
            }
        })
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("{} WHERE f.id = ? AND f.user_id = ?", SELECT_FEEDS))
                .bind(feed_id)
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// All feeds of a user, broken ones first
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "{} WHERE f.user_id = ? ORDER BY f.parsing_error_count DESC, lower(f.title) ASC",
            SELECT_FEEDS
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    pub async fn url_exists(&self, user_id: i64, feed_url: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM feeds WHERE user_id = ? AND feed_url = ?)")
                .bind(user_id)
                .bind(feed_url)
                .fetch_one(self.db.pool())
                .await?;

        Ok(exists)
    }

    /// Delete a feed with its entries and icon link
    pub async fn delete(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of the user's feeds at or above [`MAX_PARSING_ERROR`]
    pub async fn count_with_errors(&self, user_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM feeds WHERE user_id = ? AND parsing_error_count >= ?",
        )
        .bind(user_id)
        .bind(MAX_PARSING_ERROR as i64)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    /// Clear the error state of every feed, returning how many were reset
    pub async fn reset_errors(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE feeds SET parsing_error_count = 0, parsing_error_msg = '' WHERE parsing_error_count > 0",
        )
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

/// Cookie maps are stored as a JSON object
fn decode_cookies(raw: &str) -> Cookies {
    serde_json::from_str(raw).unwrap_or_default()
}
