//! Shared types, error model, and configuration for docharvest.
//!
//! This crate is the foundation depended on by all other docharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`TaskId`], [`Progress`], [`PageResult`], [`OutputOptions`], [`CrawlOutput`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ContentSelector, CrawlConfig, CrawlSection, ExtractionConfig, OutputSection,
    config_dir, config_file_path, default_selectors, init_config, load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    CrawlOutput, ExportFormat, FailureReason, OutputOptions, PageResult, Progress, TaskId,
    TaskState,
};
