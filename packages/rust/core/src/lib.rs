//! Crawl orchestration for docharvest.
//!
//! Ties the crawler and markdown crates together: [`task`] runs one crawl,
//! [`registry`] tracks many of them by id, and [`export`] turns a finished
//! crawl into a downloadable document or archive.

pub mod export;
pub mod registry;
pub mod task;

#[cfg(test)]
mod testing;

pub use export::{Download, PAGE_SEPARATOR, aggregate, base_filename};
pub use registry::TaskRegistry;
pub use task::{CrawlTask, TaskHandle, TaskReport};
