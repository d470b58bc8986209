use ::scraper::{Html, Selector};

use crate::Result;

/// Generic main-content extraction for pages without selector rules
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, page: &str, url: &str) -> Result<String>;
}

/// Containers that usually hold the main article, most specific first
const CANDIDATE_SELECTORS: &[&str] = &[
    "article",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".post-body",
    "main .content",
    "[role=main]",
    "main",
    "body",
];

/// Picks the first well-known content container that has any text
#[derive(Debug, Default, Clone)]
pub struct HeuristicExtractor;

impl ContentExtractor for HeuristicExtractor {
    fn extract(&self, page: &str, url: &str) -> Result<String> {
        let document = Html::parse_document(page);

        for candidate in CANDIDATE_SELECTORS {
            let Ok(selector) = Selector::parse(candidate) else {
                continue;
            };

            let found = document
                .select(&selector)
                .find(|el| el.text().any(|t| !t.trim().is_empty()));

            if let Some(element) = found {
                tracing::debug!("Extracted {:?} container from {}", candidate, url);
                return Ok(element.inner_html());
            }
        }

        Ok(String::new())
    }
}
