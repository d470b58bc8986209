use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::locale::DEFAULT_LANGUAGE;
use crate::Result;

/// Id of the user created with every new database
pub const DEFAULT_USER_ID: i64 = 1;

/// Id of the default user's first category
pub const DEFAULT_CATEGORY_ID: i64 = 1;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the configured database and run migrations
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let db_path = config.database_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}", db_path.display());

        tracing::info!("Connecting to database: {}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create an in-memory database, used by tests and dry runs
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // A second connection would open a second, empty in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        tracing::debug!("Running database migrations...");

        for migration in [
            MIGRATION_001_USERS,
            MIGRATION_002_CATEGORIES,
            MIGRATION_003_FEEDS,
            MIGRATION_004_ENTRIES,
            MIGRATION_005_ICONS,
            MIGRATION_INDEXES,
        ] {
            sqlx::query(migration).execute(&self.pool).await?;
        }

        sqlx::query("INSERT OR IGNORE INTO users (id, username, language) VALUES (?, 'admin', ?)")
            .bind(DEFAULT_USER_ID)
            .bind(DEFAULT_LANGUAGE)
            .execute(&self.pool)
            .await?;

        sqlx::query("INSERT OR IGNORE INTO categories (id, user_id, title) VALUES (?, ?, 'All')")
            .bind(DEFAULT_CATEGORY_ID)
            .bind(DEFAULT_USER_ID)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

const MIGRATION_001_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    language TEXT NOT NULL DEFAULT 'en_US',
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

const MIGRATION_002_CATEGORIES: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    UNIQUE(user_id, title)
)
"#;

const MIGRATION_003_FEEDS: &str = r#"
CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    feed_url TEXT NOT NULL,
    site_url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    etag_header TEXT NOT NULL DEFAULT '',
    last_modified_header TEXT NOT NULL DEFAULT '',
    checked_at DATETIME,
    parsing_error_count INTEGER NOT NULL DEFAULT 0,
    parsing_error_msg TEXT NOT NULL DEFAULT '',
    scraper_rules TEXT NOT NULL DEFAULT '',
    rewrite_rules TEXT NOT NULL DEFAULT '',
    cookies TEXT NOT NULL DEFAULT '{}',
    crawler INTEGER NOT NULL DEFAULT 0,
    username TEXT NOT NULL DEFAULT '',
    password TEXT NOT NULL DEFAULT '',
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(user_id, feed_url)
)
"#;

const MIGRATION_004_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    hash TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    author TEXT,
    content TEXT NOT NULL DEFAULT '',
    published_at DATETIME,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(feed_id, hash)
)
"#;

const MIGRATION_005_ICONS: &str = r#"
CREATE TABLE IF NOT EXISTS icons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mime_type TEXT NOT NULL,
    content BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS feed_icons (
    feed_id INTEGER PRIMARY KEY REFERENCES feeds(id) ON DELETE CASCADE,
    icon_id INTEGER NOT NULL REFERENCES icons(id) ON DELETE CASCADE
)
"#;

const MIGRATION_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_feeds_user_id ON feeds(user_id);
CREATE INDEX IF NOT EXISTS idx_entries_user_url ON entries(user_id, url);
CREATE INDEX IF NOT EXISTS idx_entries_feed_id ON entries(feed_id)
"#;
