mod handler;
mod models;
mod parser;

pub use handler::{FeedHandler, RefreshOutcome, SubscriptionRequest};
pub use models::{parse_cookies, Category, Cookies, Entry, Feed, FeedIcon, FeedModification, Icon};
pub use parser::{FeedParser, FeedRsParser};
