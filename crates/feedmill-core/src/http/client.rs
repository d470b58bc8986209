use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, ETAG,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT,
};
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Proxy};

use super::response::FetchResponse;
use crate::config::HttpConfig;
use crate::{Error, Result};

/// HTTP client for feed documents and web pages
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: u64,
}

impl Fetcher {
    /// Create a new fetcher from the HTTP configuration
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: Self::build_client(config)?,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(config: &HttpConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(Self::build_headers(&config.user_agent))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));

        if let Some(ref proxy) = config.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for fetching");
        }

        builder
            .build()
            .map_err(|e| Error::Config(format!("Unable to build HTTP client: {}", e)))
    }

    /// Build browser-like headers sent with every request
    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/html,application/xhtml+xml,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// Start a GET request for `url`
    pub fn request(&self, url: &str) -> FetchRequest<'_> {
        FetchRequest {
            fetcher: self,
            url: url.to_string(),
            credentials: None,
            etag: String::new(),
            last_modified: String::new(),
            cookies: BTreeMap::new(),
        }
    }
}

/// A single conditional GET, configured before sending
pub struct FetchRequest<'a> {
    fetcher: &'a Fetcher,
    url: String,
    credentials: Option<(String, String)>,
    etag: String,
    last_modified: String,
    cookies: BTreeMap<String, String>,
}

impl FetchRequest<'_> {
    /// Send Basic-Auth credentials; ignored unless both parts are set
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        if !username.is_empty() && !password.is_empty() {
            self.credentials = Some((username.to_string(), password.to_string()));
        }
        self
    }

    /// Revalidate against previously stored caching tokens
    pub fn with_cache_headers(mut self, etag: &str, last_modified: &str) -> Self {
        self.etag = etag.to_string();
        self.last_modified = last_modified.to_string();
        self
    }

    /// Send a `Cookie` header built from a copy of `cookies`
    pub fn with_cookies(mut self, cookies: &BTreeMap<String, String>) -> Self {
        self.cookies = cookies.clone();
        self
    }

    pub async fn send(self) -> Result<FetchResponse> {
        let mut request = self.fetcher.client.get(&self.url);

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }
        if !self.etag.is_empty() {
            request = request.header(IF_NONE_MATCH, self.etag.as_str());
        }
        if !self.last_modified.is_empty() {
            request = request.header(IF_MODIFIED_SINCE, self.last_modified.as_str());
        }
        if let Some(cookie) = cookie_header(&self.cookies) {
            request = request.header(COOKIE, cookie);
        }

        tracing::debug!("GET {}", self.url);

        let response = request
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.to_string()))?;

        let status = response.status();
        let effective_url = response.url().to_string();
        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let etag = header_string(headers, ETAG);
        let last_modified = header_string(headers, LAST_MODIFIED);
        let content_type = header_string(headers, CONTENT_TYPE);

        if let Some(length) = content_length {
            self.fetcher.ensure_content_size(length)?;
        }

        let body = self.fetcher.read_limited(response).await?;

        if effective_url != self.url {
            tracing::debug!("{} redirected to {}", self.url, effective_url);
        }

        Ok(FetchResponse {
            status,
            effective_url,
            etag,
            last_modified,
            content_type,
            content_length,
            body,
        })
    }
}

impl Fetcher {
    fn ensure_content_size(&self, size: u64) -> Result<()> {
        if size > self.max_body_bytes {
            return Err(Error::ResponseTooLarge(size));
        }
        Ok(())
    }

    /// Read the body chunk by chunk, giving up once it passes the limit
    async fn read_limited(&self, mut response: reqwest::Response) -> Result<Bytes> {
        let mut body = BytesMut::new();

        while let Some(chunk) = response.chunk().await? {
            self.ensure_content_size(body.len() as u64 + chunk.len() as u64)?;
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `name=value` pairs joined by `; `, in key order
fn cookie_header(cookies: &BTreeMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }

    let pairs: Vec<String> = cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    Some(pairs.join("; "))
}
