use anyhow::Result;

use feedmill_core::storage::Database;

pub async fn run(db: &Database, user_id: i64, feed_id: i64) -> Result<()> {
    if db.remove_feed(user_id, feed_id).await? {
        println!("Unsubscribed from feed {}", feed_id);
    } else {
        println!("Feed {} not found.", feed_id);
    }

    Ok(())
}
