use anyhow::{bail, Result};

use feedmill_core::feed::{parse_cookies, FeedModification};
use feedmill_core::storage::Database;
use feedmill_core::{Error, Storage};

use crate::FeedSettings;

pub struct FeedEdit {
    pub title: Option<String>,
    pub feed_url: Option<String>,
    pub site_url: Option<String>,
    pub category: Option<i64>,
    pub crawler: Option<bool>,
    pub settings: FeedSettings,
}

pub async fn run(db: &Database, user_id: i64, feed_id: i64, edit: FeedEdit) -> Result<()> {
    let Some(mut feed) = db.feed_by_id(user_id, feed_id).await? else {
        bail!(Error::FeedNotFound(feed_id));
    };

    if let Some(category_id) = edit.category {
        if !db.category_exists(user_id, category_id).await? {
            bail!(Error::CategoryNotFound);
        }
    }

    let modification = FeedModification {
        feed_url: edit.feed_url,
        site_url: edit.site_url,
        title: edit.title,
        category_id: edit.category,
        scraper_rules: edit.settings.scraper_rules,
        rewrite_rules: edit.settings.rewrite_rules,
        cookies: edit.settings.cookies.as_deref().map(parse_cookies),
        crawler: edit.crawler,
        username: edit.settings.username,
        password: edit.settings.password,
    };
    modification.apply(&mut feed);

    db.update_feed(&feed).await?;
    println!("Updated feed {} ({})", feed.id, feed.title);

    Ok(())
}
