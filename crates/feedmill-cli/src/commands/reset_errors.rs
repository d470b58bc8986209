use anyhow::Result;

use feedmill_core::storage::Database;

pub async fn run(db: &Database) -> Result<()> {
    let reset = db.reset_feed_errors().await?;
    println!("Cleared the error state of {} feeds.", reset);
    Ok(())
}
