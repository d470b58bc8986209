use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use super::models::{Cookies, Feed};
use super::parser::{FeedParser, FeedRsParser};
use crate::config::AppConfig;
use crate::http::{FetchResponse, Fetcher};
use crate::icon::{HttpIconFinder, IconFinder};
use crate::locale::{Localizer, Translator};
use crate::processor::FeedProcessor;
use crate::rewrite::{Rewriter, RuleRewriter};
use crate::sanitizer::{HtmlSanitizer, Sanitizer};
use crate::scraper::{ContentExtractor, HeuristicExtractor, Scraper};
use crate::storage::Storage;
use crate::{Error, Result};

/// A new subscription as asked for by the user
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRequest {
    pub user_id: i64,
    pub category_id: i64,
    pub feed_url: String,
    pub crawler: bool,
    pub username: String,
    pub password: String,
    pub scraper_rules: String,
    pub rewrite_rules: String,
    pub cookies: Cookies,
}

impl SubscriptionRequest {
    pub fn new(user_id: i64, category_id: i64, feed_url: impl Into<String>) -> Self {
        Self {
            user_id,
            category_id,
            feed_url: feed_url.into(),
            ..Self::default()
        }
    }
}

/// Result of a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server reported no change; entries were left alone
    Unmodified,
    /// The document was parsed and its entries merged
    Modified { entries: usize },
}

/// Creates feeds and refreshes them.
///
/// Every collaborator has a default built from the configuration and can be
/// replaced with one of the `with_*` methods.
#[derive(Clone)]
pub struct FeedHandler {
    store: Arc<dyn Storage>,
    fetcher: Fetcher,
    scraper: Scraper,
    parser: Arc<dyn FeedParser>,
    rewriter: Arc<dyn Rewriter>,
    sanitizer: Arc<dyn Sanitizer>,
    icon_finder: Arc<dyn IconFinder>,
    localizer: Arc<dyn Localizer>,
    default_language: String,
}

impl FeedHandler {
    pub fn new(store: Arc<dyn Storage>, config: &AppConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config.http)?;

        Ok(Self {
            store,
            scraper: Scraper::new(fetcher.clone(), Arc::new(HeuristicExtractor)),
            icon_finder: Arc::new(HttpIconFinder::new(fetcher.clone())),
            fetcher,
            parser: Arc::new(FeedRsParser),
            rewriter: Arc::new(RuleRewriter),
            sanitizer: Arc::new(HtmlSanitizer),
            localizer: Arc::new(Translator::new()),
            default_language: config.general.default_language.clone(),
        })
    }

    pub fn with_parser(mut self, parser: Arc<dyn FeedParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.scraper = Scraper::new(self.fetcher.clone(), extractor);
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_icon_finder(mut self, icon_finder: Arc<dyn IconFinder>) -> Self {
        self.icon_finder = icon_finder;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    /// Subscribe to a feed. Nothing is stored unless every step succeeds.
    pub async fn create_feed(&self, request: SubscriptionRequest) -> Result<Feed> {
        let started = Instant::now();
        let result = self.subscribe(request).await;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Feed creation finished"
        );
        result
    }

    /// Refresh a stored feed.
    ///
    /// Fetch and parse failures are counted on the feed and returned. A
    /// successful refresh, modified or not, clears the error state.
    pub async fn refresh_feed(&self, user_id: i64, feed_id: i64) -> Result<RefreshOutcome> {
        let started = Instant::now();
        let result = self.refresh(user_id, feed_id).await;
        tracing::debug!(
            feed_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Feed refresh finished"
        );
        result
    }

    async fn subscribe(&self, request: SubscriptionRequest) -> Result<Feed> {
        tracing::debug!("Creating feed {} for user {}", request.feed_url, request.user_id);

        if !self
            .store
            .category_exists(request.user_id, request.category_id)
            .await?
        {
            return Err(Error::CategoryNotFound);
        }

        let response = self
            .fetcher
            .request(&request.feed_url)
            .with_credentials(&request.username, &request.password)
            .with_cookies(&request.cookies)
            .send()
            .await?;

        response.ensure_success()?;

        if response.is_empty() {
            return Err(Error::EmptyFeed);
        }

        if self
            .store
            .feed_url_exists(request.user_id, &response.effective_url)
            .await?
        {
            return Err(Error::DuplicateFeed(response.effective_url));
        }

        let body = response.normalize_body_encoding()?;
        let mut feed = self.parser.parse(&body)?;

        self.processor(request.user_id)
            .with_crawler(request.crawler)
            .with_scraper_rules(&request.scraper_rules)
            .with_rewrite_rules(&request.rewrite_rules)
            .with_cookies(&request.cookies)
            .process(&mut feed.entries)
            .await;

        feed.user_id = request.user_id;
        feed.category.id = request.category_id;
        feed.category.user_id = request.user_id;
        feed.feed_url = response.effective_url;
        feed.etag_header = response.etag;
        feed.last_modified_header = response.last_modified;
        feed.checked_at = Some(Utc::now());
        feed.crawler = request.crawler;
        feed.scraper_rules = request.scraper_rules;
        feed.rewrite_rules = request.rewrite_rules;
        feed.cookies = request.cookies;
        feed.username = request.username;
        feed.password = request.password;
        feed.ensure_site_url();

        self.store.create_feed(&mut feed).await?;
        tracing::info!(
            "Created feed {} ({}) with {} entries",
            feed.id,
            feed.feed_url,
            feed.entries.len()
        );

        self.discover_icon(&feed).await;

        Ok(feed)
    }

    async fn refresh(&self, user_id: i64, feed_id: i64) -> Result<RefreshOutcome> {
        let language = match self.store.user_language(user_id).await {
            Ok(language) => language,
            Err(e) => {
                tracing::warn!("Unable to load language of user {}: {}", user_id, e);
                self.default_language.clone()
            }
        };

        let mut feed = self
            .store
            .feed_by_id(user_id, feed_id)
            .await?
            .ok_or(Error::FeedNotFound(feed_id))?;

        let fetched = self
            .fetcher
            .request(&feed.feed_url)
            .with_credentials(&feed.username, &feed.password)
            .with_cache_headers(&feed.etag_header, &feed.last_modified_header)
            .with_cookies(&feed.cookies)
            .send()
            .await;

        let response = match fetched {
            Ok(response) => response,
            Err(e) => return Err(self.record_failure(&mut feed, e, &language).await),
        };

        feed.checked_at = Some(Utc::now());

        match self.apply_response(&mut feed, &response).await {
            Ok(outcome) => {
                feed.reset_errors();
                feed.ensure_site_url();
                self.store.update_feed(&feed).await?;
                Ok(outcome)
            }
            Err(e) => Err(self.record_failure(&mut feed, e, &language).await),
        }
    }

    async fn apply_response(&self, feed: &mut Feed, response: &FetchResponse) -> Result<RefreshOutcome> {
        response.ensure_success()?;

        if !response.is_modified(&feed.etag_header, &feed.last_modified_header) {
            tracing::debug!("Feed {} not modified", feed.id);
            return Ok(RefreshOutcome::Unmodified);
        }

        if response.is_empty() {
            return Err(Error::EmptyFeed);
        }

        let body = response.normalize_body_encoding()?;
        let mut parsed = self.parser.parse(&body)?;

        self.processor(feed.user_id)
            .with_crawler(feed.crawler)
            .with_scraper_rules(&feed.scraper_rules)
            .with_rewrite_rules(&feed.rewrite_rules)
            .with_cookies(&feed.cookies)
            .process(&mut parsed.entries)
            .await;

        // Crawled content would be overwritten by the feed's summaries
        self.store
            .update_entries(feed.user_id, feed.id, &parsed.entries, !feed.crawler)
            .await?;

        feed.etag_header = response.etag.clone();
        feed.last_modified_header = response.last_modified.clone();

        match self.store.has_icon(feed.id).await {
            Ok(true) => {}
            Ok(false) => {
                feed.ensure_site_url();
                self.discover_icon(feed).await;
            }
            Err(e) => tracing::warn!("Unable to check icon of feed {}: {}", feed.id, e),
        }

        Ok(RefreshOutcome::Modified {
            entries: parsed.entries.len(),
        })
    }

    /// Count the failure on the feed row when it is one the user should see
    async fn record_failure(&self, feed: &mut Feed, error: Error, language: &str) -> Error {
        if !error.is_feed_failure() {
            return error;
        }

        tracing::warn!("Refresh of feed {} failed: {}", feed.id, error);
        feed.record_failure(self.localizer.localize(&error, language));

        if let Err(e) = self.store.update_feed(feed).await {
            tracing::error!("Unable to store error state of feed {}: {}", feed.id, e);
        }

        error
    }

    async fn discover_icon(&self, feed: &Feed) {
        match self.icon_finder.find_icon(&feed.site_url).await {
            Ok(Some(icon)) => match self.store.create_feed_icon(feed, &icon).await {
                Ok(()) => tracing::info!("Stored icon for feed {}", feed.id),
                Err(e) => tracing::error!("Unable to store icon of feed {}: {}", feed.id, e),
            },
            Ok(None) => tracing::info!("No icon found for {}", feed.site_url),
            Err(e) => tracing::warn!("Icon discovery failed for {}: {}", feed.site_url, e),
        }
    }

    fn processor(&self, user_id: i64) -> FeedProcessor<'_> {
        FeedProcessor::new(
            user_id,
            self.store.as_ref(),
            &self.scraper,
            self.rewriter.as_ref(),
            self.sanitizer.as_ref(),
        )
    }
}
