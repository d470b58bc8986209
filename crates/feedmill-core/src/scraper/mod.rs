//! Full-content extraction for entry pages.
//!
//! A page is fetched, checked to be HTML, and reduced to its relevant
//! fragments. How the fragments are chosen is decided once per page by
//! [`ExtractionStrategy::resolve`]: the feed's own selector rules, else a
//! predefined rule for the page's domain, else generic extraction.

mod extractor;
mod rules;

use std::sync::Arc;

use ::scraper::{ElementRef, Html, Selector};

pub use extractor::{ContentExtractor, HeuristicExtractor};
pub use rules::{find_predefined, PREDEFINED_RULES};
pub(crate) use rules::domain;

use crate::feed::Cookies;
use crate::http::Fetcher;
use crate::{Error, Result};

/// How content is pulled out of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Selector rules configured on the feed
    Rules(String),
    /// Built-in rules for a known publisher
    Predefined {
        domain: &'static str,
        rules: &'static str,
    },
    /// Generic extraction by the [`ContentExtractor`]
    Automatic,
}

impl ExtractionStrategy {
    pub fn resolve(rules: &str, website_url: &str) -> Self {
        let rules = rules.trim();
        if !rules.is_empty() {
            return ExtractionStrategy::Rules(rules.to_string());
        }

        match find_predefined(PREDEFINED_RULES, website_url) {
            Some((domain, rules)) => ExtractionStrategy::Predefined { domain, rules },
            None => ExtractionStrategy::Automatic,
        }
    }
}

/// Downloads entry pages and extracts their content
#[derive(Clone)]
pub struct Scraper {
    fetcher: Fetcher,
    extractor: Arc<dyn ContentExtractor>,
}

impl Scraper {
    pub fn new(fetcher: Fetcher, extractor: Arc<dyn ContentExtractor>) -> Self {
        Self { fetcher, extractor }
    }

    /// Fetch `website_url` and return its relevant content
    pub async fn fetch(&self, website_url: &str, rules: &str, cookies: &Cookies) -> Result<String> {
        let response = self
            .fetcher
            .request(website_url)
            .with_cookies(cookies)
            .send()
            .await?;

        response.ensure_success()?;

        if !response.is_html() {
            return Err(Error::NotHtml(response.content_type));
        }

        let page = response.normalize_body_encoding()?;

        // The entry URL could redirect somewhere else
        let website_url = response.effective_url.as_str();

        match ExtractionStrategy::resolve(rules, website_url) {
            ExtractionStrategy::Rules(rules) => {
                tracing::debug!("Using rules {:?} for {}", rules, website_url);
                scrape_content(&page, &rules)
            }
            ExtractionStrategy::Predefined { domain, rules } => {
                tracing::debug!("Using predefined rules {:?} ({}) for {}", rules, domain, website_url);
                scrape_content(&page, rules)
            }
            ExtractionStrategy::Automatic => {
                tracing::debug!("Using generic extraction for {}", website_url);
                self.extractor.extract(&page, website_url)
            }
        }
    }
}

/// Concatenate the inner HTML of every node matching `rules`, in document order.
///
/// Images and iframes contribute their parent's inner HTML instead, keeping
/// the markup around them (captions, links, wrappers).
pub fn scrape_content(page: &str, rules: &str) -> Result<String> {
    let selector = Selector::parse(rules).map_err(|_| Error::InvalidSelector(rules.to_string()))?;
    let document = Html::parse_document(page);

    let mut contents = String::new();
    for element in document.select(&selector) {
        let name = element.value().name();
        if name == "img" || name == "iframe" {
            if let Some(parent) = element.parent().and_then(ElementRef::wrap) {
                contents.push_str(&parent.inner_html());
            }
        } else {
            contents.push_str(&element.inner_html());
        }
    }

    Ok(contents)
}
