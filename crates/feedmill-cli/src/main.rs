use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedmill_core::storage::{Database, DEFAULT_CATEGORY_ID, DEFAULT_USER_ID};
use feedmill_core::{AppConfig, FeedHandler};

mod commands;

#[derive(Parser)]
#[command(name = "feedmill")]
#[command(author, version, about = "Subscribe to feeds and keep them fresh")]
struct Cli {
    /// User owning the feeds
    #[arg(short, long, global = true, default_value_t = DEFAULT_USER_ID)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a feed
    Subscribe {
        /// Feed URL
        url: String,
        /// Category receiving the feed
        #[arg(short, long, default_value_t = DEFAULT_CATEGORY_ID)]
        category: i64,
        /// Fetch the full page of every new entry
        #[arg(long)]
        crawler: bool,
        #[command(flatten)]
        settings: FeedSettings,
    },
    /// Refresh one feed, or every feed of the user
    Refresh {
        /// Feed id (all feeds when omitted)
        feed_id: Option<i64>,
    },
    /// List subscriptions, broken feeds first
    List,
    /// Change the settings of a feed (clears its error state)
    Edit {
        feed_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        feed_url: Option<String>,
        #[arg(long)]
        site_url: Option<String>,
        #[arg(long)]
        category: Option<i64>,
        /// Enable or disable crawling
        #[arg(long)]
        crawler: Option<bool>,
        #[command(flatten)]
        settings: FeedSettings,
    },
    /// Remove a feed and its entries
    Unsubscribe { feed_id: i64 },
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Clear the error counters of every feed
    ResetErrors,
}

/// Options shared by `subscribe` and `edit`
#[derive(Args)]
pub struct FeedSettings {
    /// CSS selector picking the content of crawled pages
    #[arg(long)]
    scraper_rules: Option<String>,
    /// Comma-separated rewrite rules
    #[arg(long)]
    rewrite_rules: Option<String>,
    /// Cookies sent with every request, as `name=value; name2=value2`
    #[arg(long)]
    cookies: Option<String>,
    /// HTTP Basic username
    #[arg(long)]
    username: Option<String>,
    /// HTTP Basic password
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create a category
    Add { title: String },
    /// List categories
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let db = Arc::new(Database::new(&config).await?);
    let user_id = cli.user;

    match cli.command {
        Commands::Subscribe {
            url,
            category,
            crawler,
            settings,
        } => {
            let handler = FeedHandler::new(db.clone(), &config)?;
            commands::subscribe::run(&handler, user_id, category, &url, crawler, settings).await
        }
        Commands::Refresh { feed_id } => {
            let handler = FeedHandler::new(db.clone(), &config)?;
            commands::refresh::run(&db, &handler, user_id, feed_id).await
        }
        Commands::List => commands::list::run(&db, user_id).await,
        Commands::Edit {
            feed_id,
            title,
            feed_url,
            site_url,
            category,
            crawler,
            settings,
        } => {
            let edit = commands::edit::FeedEdit {
                title,
                feed_url,
                site_url,
                category,
                crawler,
                settings,
            };
            commands::edit::run(&db, user_id, feed_id, edit).await
        }
        Commands::Unsubscribe { feed_id } => commands::unsubscribe::run(&db, user_id, feed_id).await,
        Commands::Category { action } => match action {
            CategoryAction::Add { title } => commands::category::add(&db, user_id, &title).await,
            CategoryAction::List => commands::category::list(&db, user_id).await,
        },
        Commands::ResetErrors => commands::reset_errors::run(&db).await,
    }
}
