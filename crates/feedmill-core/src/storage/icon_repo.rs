use sqlx::FromRow;

use super::Database;
use crate::feed::Icon;
use crate::Result;

/// Repository for site icons and their feed links
pub struct IconRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct IconRow {
    id: i64,
    mime_type: String,
    content: Vec<u8>,
}

impl From<IconRow> for Icon {
    fn from(row: IconRow) -> Self {
        Icon {
            id: row.id,
            mime_type: row.mime_type,
            content: row.content,
        }
    }
}

impl<'a> IconRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn feed_has_icon(&self, feed_id: i64) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM feed_icons WHERE feed_id = ?)")
                .bind(feed_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(exists)
    }

    /// Store the icon (reusing an identical one) and link it to the feed.
    ///
    /// A feed keeps the first icon linked to it; later calls return the
    /// id of that icon and store nothing.
    pub async fn attach(&self, feed_id: i64, icon: &Icon) -> Result<i64> {
        let mut tx = self.db.pool().begin().await?;

        let linked: Option<(i64,)> =
            sqlx::query_as("SELECT icon_id FROM feed_icons WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((icon_id,)) = linked {
            tracing::debug!("Feed {} already has icon {}", feed_id, icon_id);
            return Ok(icon_id);
        }

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM icons WHERE mime_type = ? AND content = ?")
                .bind(&icon.mime_type)
                .bind(&icon.content)
                .fetch_optional(&mut *tx)
                .await?;

        let icon_id = match existing {
            Some((id,)) => id,
            None => sqlx::query("INSERT INTO icons (mime_type, content) VALUES (?, ?)")
                .bind(&icon.mime_type)
                .bind(&icon.content)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid(),
        };

        sqlx::query("INSERT OR IGNORE INTO feed_icons (feed_id, icon_id) VALUES (?, ?)")
            .bind(feed_id)
            .bind(icon_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(icon_id)
    }

    pub async fn find_by_feed(&self, feed_id: i64) -> Result<Option<Icon>> {
        let row: Option<IconRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.mime_type, i.content
            FROM icons i
            JOIN feed_icons fi ON fi.icon_id = i.id
            WHERE fi.feed_id = ?
            "#,
        )
        .bind(feed_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Icon::from))
    }
}
