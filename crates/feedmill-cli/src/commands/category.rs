use anyhow::Result;

use feedmill_core::storage::Database;

pub async fn add(db: &Database, user_id: i64, title: &str) -> Result<()> {
    let category = db.create_category(user_id, title).await?;
    println!("Created category {} ({})", category.id, category.title);
    Ok(())
}

pub async fn list(db: &Database, user_id: i64) -> Result<()> {
    let categories = db.categories(user_id).await?;

    if categories.is_empty() {
        println!("No categories.");
        return Ok(());
    }

    for category in &categories {
        println!("  {} - {}", category.id, category.title);
    }

    Ok(())
}
