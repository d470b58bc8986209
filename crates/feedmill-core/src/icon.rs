//! Site icon discovery.

use ::scraper::{Html, Selector};
use async_trait::async_trait;
use url::Url;

use crate::feed::Icon;
use crate::http::Fetcher;
use crate::Result;

/// Finds the icon of a website
#[async_trait]
pub trait IconFinder: Send + Sync {
    /// `Ok(None)` when the site has no usable icon
    async fn find_icon(&self, site_url: &str) -> Result<Option<Icon>>;
}

const ICON_SELECTOR: &str = r#"link[rel~="icon"], link[rel="apple-touch-icon"]"#;

/// Looks for `<link rel="icon">` on the site page, then `/favicon.ico`
#[derive(Clone)]
pub struct HttpIconFinder {
    fetcher: Fetcher,
}

impl HttpIconFinder {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    async fn download(&self, icon_url: &str) -> Result<Option<Icon>> {
        let response = self.fetcher.request(icon_url).send().await?;
        if response.has_server_failure() || response.body.is_empty() {
            return Ok(None);
        }

        let mime_type = response
            .content_type
            .split(';')
            .next()
            .map(str::trim)
            .filter(|t| t.starts_with("image/"))
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime_type(icon_url).to_string());

        Ok(Some(Icon {
            id: 0,
            mime_type,
            content: response.body.to_vec(),
        }))
    }
}

#[async_trait]
impl IconFinder for HttpIconFinder {
    async fn find_icon(&self, site_url: &str) -> Result<Option<Icon>> {
        let base = Url::parse(site_url)?;

        let mut candidates = Vec::new();
        match self.fetcher.request(site_url).send().await {
            Ok(response) if !response.has_server_failure() && response.is_html() => {
                let page = response.normalize_body_encoding()?;
                candidates = icon_links(&page, &response.effective_url);
            }
            Ok(response) => {
                tracing::debug!("No usable page at {} (status {})", site_url, response.status)
            }
            Err(e) => tracing::debug!("Unable to fetch {} for icon lookup: {}", site_url, e),
        }
        candidates.push(base.join("/favicon.ico")?.to_string());

        for candidate in candidates {
            match self.download(&candidate).await {
                Ok(Some(icon)) => {
                    tracing::debug!("Found icon {} for {}", candidate, site_url);
                    return Ok(Some(icon));
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("Unable to download icon {}: {}", candidate, e),
            }
        }

        Ok(None)
    }
}

/// Absolute icon URLs declared by the page, in document order
fn icon_links(page: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse(ICON_SELECTOR) else {
        return Vec::new();
    };

    Html::parse_document(page)
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
        .collect()
}

fn guess_mime_type(icon_url: &str) -> &'static str {
    let path = icon_url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "image/x-icon",
    }
}
