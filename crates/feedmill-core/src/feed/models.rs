use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cookie name → value, sent with every request for a feed's pages
pub type Cookies = BTreeMap<String, String>;

/// A feed subscription owned by one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub category: Category,
    pub feed_url: String,
    pub site_url: String,
    pub title: String,
    pub etag_header: String,
    pub last_modified_header: String,
    pub checked_at: Option<DateTime<Utc>>,
    pub parsing_error_count: u32,
    pub parsing_error_msg: String,
    pub scraper_rules: String,
    pub rewrite_rules: String,
    pub cookies: Cookies,
    pub crawler: bool,
    pub username: String,
    pub password: String,
    pub icon: Option<FeedIcon>,
    /// Entries of the current processing pass (not loaded from storage)
    #[serde(skip)]
    pub entries: Vec<Entry>,
}

impl Feed {
    /// Count one more failed refresh and remember its message
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.parsing_error_count += 1;
        self.parsing_error_msg = message.into();
    }

    /// Clear the error state after a successful refresh
    pub fn reset_errors(&mut self) {
        self.parsing_error_count = 0;
        self.parsing_error_msg.clear();
    }

    /// Fall back to the feed URL when the document named no site
    pub fn ensure_site_url(&mut self) {
        if self.site_url.is_empty() {
            self.site_url = self.feed_url.clone();
        }
    }

    pub fn has_errors(&self) -> bool {
        self.parsing_error_count > 0
    }
}

/// An item of a feed, owned by the feed's user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    /// Identity within the feed (the document's guid, or the URL)
    pub hash: String,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
}

/// Link between a feed and its stored icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedIcon {
    pub feed_id: i64,
    pub icon_id: i64,
}

/// A downloaded site icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub id: i64,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// User-editable feed settings; applying them clears the error state
#[derive(Debug, Clone, Default)]
pub struct FeedModification {
    pub feed_url: Option<String>,
    pub site_url: Option<String>,
    pub title: Option<String>,
    pub category_id: Option<i64>,
    pub scraper_rules: Option<String>,
    pub rewrite_rules: Option<String>,
    pub cookies: Option<Cookies>,
    pub crawler: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl FeedModification {
    pub fn apply(self, feed: &mut Feed) {
        if let Some(feed_url) = self.feed_url {
            feed.feed_url = feed_url;
        }
        if let Some(site_url) = self.site_url {
            feed.site_url = site_url;
        }
        if let Some(title) = self.title {
            feed.title = title;
        }
        if let Some(category_id) = self.category_id {
            feed.category.id = category_id;
        }
        if let Some(rules) = self.scraper_rules {
            feed.scraper_rules = rules;
        }
        if let Some(rules) = self.rewrite_rules {
            feed.rewrite_rules = rules;
        }
        if let Some(cookies) = self.cookies {
            feed.cookies = cookies;
        }
        if let Some(crawler) = self.crawler {
            feed.crawler = crawler;
        }
        if let Some(username) = self.username {
            feed.username = username;
        }
        if let Some(password) = self.password {
            feed.password = password;
        }
        feed.reset_errors();
    }
}

/// Parse a `Cookie`-style string (`a=1; b=2`) into a cookie map.
///
/// Pairs without `=` or with an empty name are skipped.
pub fn parse_cookies(raw: &str) -> Cookies {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}
