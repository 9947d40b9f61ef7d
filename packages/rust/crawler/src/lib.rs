//! Crawl building blocks: URL scoping, the frontier, content extraction,
//! link discovery, and page fetching.
//!
//! This crate provides:
//! - [`scope`]: URL normalization and same-site/same-section checks
//! - [`Frontier`]: FIFO work queue plus visited-set
//! - [`ContentExtractor`]: ordered-selector main-content extraction
//! - [`links`]: hyperlink discovery and resolution
//! - [`PageFetcher`] / [`HttpFetcher`]: page fetching with a timeout

pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod links;
pub mod scope;

pub use extractor::{ContentExtractor, Extraction, extract_main_content};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::{Frontier, QueueEntry};
pub use links::{extract_links, extract_links_from_markup};
pub use scope::{NormalizedUrl, Scope, in_scope, normalize, scope_of};
