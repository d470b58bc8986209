use sqlx::FromRow;

use super::Database;
use crate::feed::Category;
use crate::locale::DEFAULT_LANGUAGE;
use crate::Result;

/// Repository for users and their categories
pub struct CategoryRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct CategoryRow {
    id: i64,
    user_id: i64,
    title: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
        }
    }
}

impl<'a> CategoryRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: i64, title: &str) -> Result<Category> {
        let result = sqlx::query("INSERT INTO categories (user_id, title) VALUES (?, ?)")
            .bind(user_id)
            .bind(title)
            .execute(self.db.pool())
            .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            user_id,
            title: title.to_string(),
        })
    }

    pub async fn exists(&self, user_id: i64, category_id: i64) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE user_id = ? AND id = ?)")
                .bind(user_id)
                .bind(category_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(exists)
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, user_id, title FROM categories WHERE user_id = ? ORDER BY lower(title) ASC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Create a user with the given interface language, returning its id
    pub async fn create_user(&self, username: &str, language: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO users (username, language) VALUES (?, ?)")
            .bind(username)
            .bind(language)
            .execute(self.db.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Interface language of a user; unknown users get the default language
    pub async fn user_language(&self, user_id: i64) -> Result<String> {
        let language: Option<(String,)> = sqlx::query_as("SELECT language FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(language
            .map(|(language,)| language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()))
    }
}
