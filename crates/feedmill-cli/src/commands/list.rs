use anyhow::Result;

use feedmill_core::storage::{Database, MAX_PARSING_ERROR};

pub async fn run(db: &Database, user_id: i64) -> Result<()> {
    let feeds = db.feeds(user_id).await?;

    if feeds.is_empty() {
        println!("No subscriptions yet.");
        println!("\nTo subscribe to a feed, run:");
        println!("  feedmill subscribe <url>");
        return Ok(());
    }

    println!("Subscriptions ({}):\n", feeds.len());

    for feed in &feeds {
        let crawler = if feed.crawler { " [crawler]" } else { "" };
        println!("  {} - {} ({}){}", feed.id, feed.title, feed.category.title, crawler);
        println!("    URL: {}", feed.feed_url);
        if let Some(checked_at) = feed.checked_at {
            println!("    Last checked: {}", checked_at.format("%Y-%m-%d %H:%M"));
        }
        if feed.has_errors() {
            println!(
                "    Errors: {} ({})",
                feed.parsing_error_count, feed.parsing_error_msg
            );
        }
        println!();
    }

    let broken = db.count_error_feeds(user_id).await?;
    if broken > 0 {
        println!(
            "{} feeds failed {} times or more in a row, see `feedmill reset-errors`.",
            broken, MAX_PARSING_ERROR
        );
    }

    Ok(())
}
