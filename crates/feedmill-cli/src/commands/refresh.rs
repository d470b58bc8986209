use anyhow::Result;

use feedmill_core::storage::Database;
use feedmill_core::{FeedHandler, RefreshOutcome};

pub async fn run(db: &Database, handler: &FeedHandler, user_id: i64, feed_id: Option<i64>) -> Result<()> {
    if let Some(feed_id) = feed_id {
        let outcome = handler.refresh_feed(user_id, feed_id).await?;
        println!("Feed {}: {}", feed_id, describe(outcome));
        return Ok(());
    }

    let feeds = db.feeds(user_id).await?;
    println!("Refreshing {} feeds...\n", feeds.len());

    let mut failed = 0;
    for feed in &feeds {
        match handler.refresh_feed(user_id, feed.id).await {
            Ok(outcome) => println!("  {} - {}: {}", feed.id, feed.title, describe(outcome)),
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to refresh feed {}: {}", feed.id, e);
                println!("  {} - {}: {}", feed.id, feed.title, e);
            }
        }
    }

    println!("\nRefresh complete, {} of {} feeds failed.", failed, feeds.len());

    Ok(())
}

fn describe(outcome: RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Unmodified => "not modified".to_string(),
        RefreshOutcome::Modified { entries } => format!("{} entries", entries),
    }
}
