//! In-memory fetcher for crawl tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use url::Url;

use docharvest_crawler::{FetchedPage, PageFetcher};
use docharvest_shared::{HarvestError, Result};

/// A site held in memory, keyed by URL. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub(crate) struct StubSite {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    broken: HashSet<String>,
}

impl StubSite {
    pub(crate) fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    /// Delay every fetch of `url`.
    pub(crate) fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Fail every fetch of `url` with an I/O error instead of an HTTP one.
    pub(crate) fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }
}

impl PageFetcher for StubSite {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        if let Some(delay) = self.delays.get(url.as_str()).copied() {
            tokio::time::sleep(delay).await;
        }
        if self.broken.contains(url.as_str()) {
            return Err(HarvestError::io(
                "/var/cache/docharvest",
                std::io::Error::other("disk full"),
            ));
        }
        match self.pages.get(url.as_str()) {
            Some(body) => Ok(FetchedPage {
                url: url.clone(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(HarvestError::fetch(url, "HTTP 404 Not Found")),
        }
    }
}

/// A documentation page with a breadcrumb above its title and `links` in the body.
pub(crate) fn doc(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
        .collect();
    format!(
        "<html><body><nav>Menu</nav><main><p>Docs / {title}</p><h1>{title}</h1><p>{title} body.</p>{anchors}</main></body></html>"
    )
}
