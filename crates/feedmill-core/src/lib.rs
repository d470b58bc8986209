pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod icon;
pub mod locale;
pub mod processor;
pub mod rewrite;
pub mod sanitizer;
pub mod scraper;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use feed::{Entry, Feed, FeedHandler, RefreshOutcome, SubscriptionRequest};
pub use storage::{Database, Storage};
