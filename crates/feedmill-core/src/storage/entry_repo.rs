use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::feed::Entry;
use crate::Result;

/// Repository for feed entries
pub struct EntryRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct EntryRow {
    id: i64,
    user_id: i64,
    feed_id: i64,
    hash: String,
    url: String,
    title: String,
    author: Option<String>,
    content: String,
    published_at: Option<DateTime<Utc>>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            user_id: row.user_id,
            feed_id: row.feed_id,
            hash: row.hash,
            url: row.url,
            title: row.title,
            author: row.author,
            content: row.content,
            published_at: row.published_at,
        }
    }
}

const INSERT_OR_IGNORE: &str = r#"
    INSERT OR IGNORE INTO entries
    (user_id, feed_id, hash, url, title, author, content, published_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_OR_UPDATE: &str = r#"
    INSERT INTO entries
    (user_id, feed_id, hash, url, title, author, content, published_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(feed_id, hash) DO UPDATE SET
        url = excluded.url,
        title = excluded.title,
        author = excluded.author,
        content = excluded.content,
        published_at = COALESCE(excluded.published_at, published_at)
"#;

impl<'a> EntryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Whether the user already has an entry with this URL, in any feed
    pub async fn url_exists(&self, user_id: i64, url: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM entries WHERE user_id = ? AND url = ?)")
                .bind(user_id)
                .bind(url)
                .fetch_one(self.db.pool())
                .await?;

        Ok(exists)
    }

    /// Insert new entries; existing ones (same feed and hash) are
    /// overwritten only when `update_existing` is set.
    pub async fn merge(
        &self,
        user_id: i64,
        feed_id: i64,
        entries: &[Entry],
        update_existing: bool,
    ) -> Result<()> {
        let statement = if update_existing {
            INSERT_OR_UPDATE
        } else {
            INSERT_OR_IGNORE
        };

        let mut tx = self.db.pool().begin().await?;
        for entry in entries {
            sqlx::query(statement)
                .bind(user_id)
                .bind(feed_id)
                .bind(&entry.hash)
                .bind(&entry.url)
                .bind(&entry.title)
                .bind(&entry.author)
                .bind(&entry.content)
                .bind(entry.published_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Entries of a feed, newest first
    pub async fn list_by_feed(&self, user_id: i64, feed_id: i64) -> Result<Vec<Entry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, feed_id, hash, url, title, author, content, published_at
            FROM entries
            WHERE user_id = ? AND feed_id = ?
            ORDER BY published_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }
}
