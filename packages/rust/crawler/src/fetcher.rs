//! Page fetching over HTTP.
//!
//! [`PageFetcher`] is the seam the crawl loop fetches through; [`HttpFetcher`]
//! is the `reqwest` implementation used outside of tests.

use std::future::Future;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use docharvest_shared::{CrawlConfig, HarvestError, Result};

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; links are resolved against it.
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Fetches one page. Errors are page-level (`PageFetch` / `PageParse`).
pub trait PageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedPage>> + Send;
}

/// `reqwest`-backed fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher from the crawl configuration.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarvestError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        debug!("fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url, describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::fetch(url, format!("HTTP {status}")));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html_content_type(content_type) {
                return Err(HarvestError::parse(
                    url,
                    format!("unsupported content type '{content_type}'"),
                ));
            }
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::fetch(url, format!("body read failed: {e}")))?;

        debug!(status = status.as_u16(), len = body.len(), "page fetched");

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_redirect() {
        format!("too many redirects: {err}")
    } else {
        err.to_string()
    }
}

/// Whether a `Content-Type` header value denotes an HTML-ish document.
fn is_html_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml" || mime == "text/plain"
}
