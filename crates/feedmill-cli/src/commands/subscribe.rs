use anyhow::Result;

use feedmill_core::feed::parse_cookies;
use feedmill_core::{FeedHandler, SubscriptionRequest};

use crate::FeedSettings;

pub async fn run(
    handler: &FeedHandler,
    user_id: i64,
    category_id: i64,
    url: &str,
    crawler: bool,
    settings: FeedSettings,
) -> Result<()> {
    println!("Subscribing to feed: {}", url);

    let mut request = SubscriptionRequest::new(user_id, category_id, url);
    request.crawler = crawler;
    request.scraper_rules = settings.scraper_rules.unwrap_or_default();
    request.rewrite_rules = settings.rewrite_rules.unwrap_or_default();
    request.cookies = settings.cookies.as_deref().map(parse_cookies).unwrap_or_default();
    request.username = settings.username.unwrap_or_default();
    request.password = settings.password.unwrap_or_default();

    let feed = handler.create_feed(request).await?;

    println!("Created subscription {} ({})", feed.id, feed.title);
    if feed.feed_url != url {
        println!("Feed URL: {}", feed.feed_url);
    }
    println!("Fetched {} entries", feed.entries.len());

    Ok(())
}
