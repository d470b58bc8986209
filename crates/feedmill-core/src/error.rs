use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Category not found for this user")]
    CategoryNotFound,

    #[error("Unable to execute request: {0}")]
    RequestFailed(String),

    #[error("Unable to fetch feed (Status Code = {0})")]
    ServerFailure(u16),

    #[error("Resource not found (404), this feed doesn't exist anymore, check the feed URL")]
    ResourceNotFound,

    #[error("This feed is empty")]
    EmptyFeed,

    #[error("Unable to normalize encoding: {0}")]
    Encoding(String),

    #[error("This feed already exists ({0})")]
    DuplicateFeed(String),

    #[error("Feed {0} not found")]
    FeedNotFound(i64),

    #[error("Unable to parse feed: {0}")]
    Parse(String),

    #[error("Response too large ({0} bytes)")]
    ResponseTooLarge(u64),

    #[error("This resource is not a HTML document ({0})")]
    NotHtml(String),

    #[error("Invalid scraper rules {0:?}")]
    InvalidSelector(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Message template and arguments for the user-facing kinds.
    ///
    /// Templates use `{}` placeholders filled in order; rendering a template
    /// with its arguments in English gives the same text as `Display`.
    pub fn template(&self) -> Option<(&'static str, Vec<String>)> {
        let localized = match self {
            Error::CategoryNotFound => ("Category not found for this user", vec![]),
            Error::RequestFailed(cause) => ("Unable to execute request: {}", vec![cause.clone()]),
            Error::ServerFailure(status) => {
                ("Unable to fetch feed (Status Code = {})", vec![status.to_string()])
            }
            Error::ResourceNotFound => (
                "Resource not found (404), this feed doesn't exist anymore, check the feed URL",
                vec![],
            ),
            Error::EmptyFeed => ("This feed is empty", vec![]),
            Error::Encoding(cause) => ("Unable to normalize encoding: {}", vec![cause.clone()]),
            Error::DuplicateFeed(url) => ("This feed already exists ({})", vec![url.clone()]),
            Error::FeedNotFound(id) => ("Feed {} not found", vec![id.to_string()]),
            Error::Parse(cause) => ("Unable to parse feed: {}", vec![cause.clone()]),
            Error::ResponseTooLarge(size) => ("Response too large ({} bytes)", vec![size.to_string()]),
            _ => return None,
        };

        Some(localized)
    }

    /// Whether a refresh failing with this error is recorded on the feed row.
    ///
    /// Fetch, decode and parse failures count against the feed's health;
    /// storage failures are infrastructure problems and are only returned.
    pub fn is_feed_failure(&self) -> bool {
        matches!(
            self,
            Error::RequestFailed(_)
                | Error::ServerFailure(_)
                | Error::ResourceNotFound
                | Error::EmptyFeed
                | Error::Encoding(_)
                | Error::Parse(_)
                | Error::ResponseTooLarge(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RequestFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
